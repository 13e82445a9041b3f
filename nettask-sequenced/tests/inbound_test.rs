use nettask_sequenced::{InboundSequencer, SequenceVerdict};

#[test]
fn test_accepts_in_order_only() {
    let mut seq = InboundSequencer::new();
    assert_eq!(seq.expected(), 1);

    assert_eq!(seq.check(1), SequenceVerdict::Accept);
    seq.advance();
    assert_eq!(seq.check(2), SequenceVerdict::Accept);
    seq.advance();
    assert_eq!(seq.expected(), 3);
}

#[test]
fn test_retransmitted_duplicates_are_reackable() {
    let mut seq = InboundSequencer::new();
    seq.advance(); // delivered 1
    seq.advance(); // delivered 2

    // A retransmission of an already-delivered task.
    assert_eq!(seq.check(2), SequenceVerdict::Duplicate);
    assert_eq!(seq.check(1), SequenceVerdict::Duplicate);
    // Expected sequence is unchanged by duplicates.
    assert_eq!(seq.expected(), 3);
}

#[test]
fn test_ahead_is_discarded_without_advancing() {
    let seq = InboundSequencer::new();
    assert_eq!(seq.check(2), SequenceVerdict::Ahead);
    assert_eq!(seq.check(500), SequenceVerdict::Ahead);
    assert_eq!(seq.expected(), 1);
}

#[test]
fn test_wraparound_keeps_behind_ahead_split() {
    let mut seq = InboundSequencer::new();
    // Walk the counter to the wrap boundary.
    for _ in 0..u16::MAX {
        seq.advance();
    }
    assert_eq!(seq.expected(), 0);

    assert_eq!(seq.check(0), SequenceVerdict::Accept);
    assert_eq!(seq.check(u16::MAX), SequenceVerdict::Duplicate);
    assert_eq!(seq.check(1), SequenceVerdict::Ahead);
}
