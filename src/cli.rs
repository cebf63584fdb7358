//! Interface de linha de comando do ccmonitor baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (status, watch, control)
//! e flags globais (--server, --config, --verbose).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ccmonitor: acompanha o status de builds em um servidor de integração contínua.
#[derive(Debug, Parser)]
#[command(name = "ccmonitor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL do servidor; sobrescreve o arquivo e a variável de ambiente.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Caminho do arquivo de configuração.
    #[arg(long, global = true, default_value = ccmonitor::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Faz um único poll e mostra o estado atual do projeto.
    Status {
        /// Nome do projeto (usa `default_project` se omitido).
        project: Option<String>,

        /// Imprime o relatório em JSON.
        #[arg(long)]
        json: bool,
    },

    /// Faz polls periódicos e mostra transições de build até Ctrl-C.
    Watch {
        /// Nome do projeto (usa `default_project` se omitido).
        project: Option<String>,

        /// Intervalo entre polls em segundos.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Envia um comando de controle ao servidor.
    Control {
        /// Ação a executar.
        action: ControlAction,

        /// Nome do projeto (usa `default_project` se omitido).
        project: Option<String>,

        /// Usuário que assume a correção (apenas para `fix`).
        #[arg(long)]
        user: Option<String>,
    },
}

/// Comandos de controle aceitos pelo servidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ControlAction {
    /// Força um novo build.
    Force,
    /// Aborta o build em andamento.
    Abort,
    /// Anuncia que alguém está corrigindo o build quebrado.
    Fix,
    /// Para o agendador do projeto.
    Stop,
    /// Inicia o agendador do projeto.
    Start,
    /// Cancela um build pendente na fila.
    Cancel,
}
