//! The operator menu and the console rendering of the registry and the
//! metric store.

use std::io::{self, BufRead, Write};
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::mpsc;

use tracing::debug;

use crate::dispatch;
use crate::endpoint::ServerState;
use crate::tasks;

pub fn run(
    sock: &UdpSocket,
    state: &ServerState,
    ack_rx: &mpsc::Receiver<(SocketAddr, u16)>,
) -> io::Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!();
        println!("=== NMS Server ===");
        println!("1. Carregar tarefas do arquivo");
        println!("2. Enviar tarefas");
        println!("3. Exibir agentes registrados");
        println!("4. Exibir métricas");
        println!("5. Sair");
        print!("Escolha uma opção: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            return Ok(());
        };
        match line?.trim() {
            "1" => {
                print!("Digite o caminho do arquivo: ");
                io::stdout().flush()?;
                let Some(path) = lines.next() else {
                    return Ok(());
                };
                load_tasks_into(state, Path::new(path?.trim()));
            }
            "2" => dispatch::dispatch_pending(sock, state, ack_rx)?,
            "3" => print_agents(state),
            "4" => {
                print!("Filtrar por Task ID (vazio para todas): ");
                io::stdout().flush()?;
                let Some(filter) = lines.next() else {
                    return Ok(());
                };
                print_metrics(state, filter?.trim().parse().ok());
            }
            "5" => {
                println!("Encerrando o NMS Server...");
                return Ok(());
            }
            _ => println!("Opção inválida. Tente novamente."),
        }
    }
}

fn load_tasks_into(state: &ServerState, path: &Path) {
    match tasks::load_tasks(path) {
        Ok(entries) => {
            let count = entries.len();
            let mut outbound = state.outbound.lock();
            for (agent, task) in entries {
                let seq = outbound.enqueue(agent, &task);
                debug!(%agent, seq, task_id = task.task_id, "task queued");
            }
            println!("{count} tarefa(s) carregada(s) de {}", path.display());
        }
        Err(e) => println!("Erro ao carregar tarefas do arquivo: {e}"),
    }
}

fn print_agents(state: &ServerState) {
    let agents = state.registry.lock().snapshot();
    if agents.is_empty() {
        println!("Nenhum agente registado.");
        return;
    }

    println!("\n=== Registered Agents ===");
    println!("{:<10} {:<22} {:<20} {:<20}", "Agent ID", "Address", "Registered", "Last Seen");
    for (agent, entry) in agents {
        println!(
            "{:<10} {:<22} {:<20} {:<20}",
            agent.to_string(),
            entry.addr.to_string(),
            entry.registered_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.last_seen.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
    }
}

fn print_metrics(state: &ServerState, task_filter: Option<u16>) {
    let store = state.store.lock();
    if store.is_empty() {
        println!("Nenhuma métrica registada.");
        return;
    }

    println!("\n=== Metrics ===");
    match task_filter {
        None => {
            println!("{:<10} {:<8} Metrics", "Agent ID", "Task ID");
            for ((agent, task_id), observations) in store.all() {
                for (row, observation) in observations.iter().enumerate() {
                    if row == 0 {
                        println!("{:<10} {:<8} {}", agent.to_string(), task_id, observation.text);
                    } else {
                        println!("{:<10} {:<8} {}", "", "", observation.text);
                    }
                }
            }
        }
        Some(task_id) => {
            let rows = store.by_task(task_id);
            if rows.is_empty() {
                println!("Nenhuma métrica registada para a Tarefa {task_id}.");
                return;
            }
            println!("{:<10} Metrics", "Agent ID");
            for (agent, observation) in &rows {
                println!("{:<10} {}", agent.to_string(), observation.text);
            }

            let mut agents: Vec<_> = rows.iter().map(|(agent, _)| *agent).collect();
            agents.dedup();
            println!("\nÚltimo valor por agente:");
            for agent in agents {
                if let Some(observation) = store.latest(agent, task_id) {
                    println!(
                        "{:<10} [{}] {}",
                        agent.to_string(),
                        observation.received_at.format("%Y-%m-%d %H:%M:%S"),
                        observation.text
                    );
                }
            }
        }
    }
}
