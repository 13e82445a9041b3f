use nettask_proto::{AgentBound, ServerBound};
use proptest::prelude::*;

proptest! {
    // Decoding arbitrary bytes must fail cleanly, never panic or overrun.
    #[test]
    fn decode_never_panics(buf in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = ServerBound::decode(&buf);
        let _ = AgentBound::decode(&buf);
    }

    // Any datagram that decodes in one direction stays within its buffer:
    // re-encoding a decoded task reproduces the original bytes.
    #[test]
    fn task_decode_encode_is_stable(
        seq in any::<u16>(),
        task_id in any::<u16>(),
        iface in "[a-z0-9]{0,8}",
        text in "[ -~]{0,32}",
        frequency in any::<u8>(),
        duration in any::<u8>(),
    ) {
        let task = nettask_proto::Task {
            task_id,
            task_type: nettask_proto::TaskType::Cpu,
            interface_check: iface,
            data: nettask_proto::TaskData::Text(text),
            frequency,
            duration,
        };
        let pdu = nettask_proto::encode_task(seq, &task);
        match AgentBound::decode(&pdu).unwrap() {
            AgentBound::Task { seq: got_seq, task: decoded } => {
                prop_assert_eq!(got_seq, seq);
                prop_assert_eq!(&nettask_proto::encode_task(got_seq, &decoded), &pdu);
            }
            other => prop_assert!(false, "unexpected decode: {:?}", other),
        }
    }
}
