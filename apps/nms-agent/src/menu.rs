//! The interactive operator menu. Runs on the main thread; returning means
//! the operator chose to quit (or stdin closed).

use std::io::{self, BufRead, Write};

use crate::logs::AgentLogs;

pub fn run(logs: &AgentLogs) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!();
        println!("=== NMS Agent ===");
        println!("1. Exibir registo de tarefas");
        println!("2. Exibir alertas");
        println!("3. Sair");
        print!("Escolha uma opção: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            return Ok(());
        };
        match line?.trim() {
            "1" => println!("{}", logs.render_results()),
            "2" => println!("{}", logs.render_alerts()),
            "3" => return Ok(()),
            _ => println!("Opção inválida. Tente novamente."),
        }
    }
}
