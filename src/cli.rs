//! Interface de linha de comando do xrfjob baseada em clap.
//!
//! Um subcomando por etapa do fluxo, mais `status` e `reset`. O estado da
//! etapa fica no diretório de cache, então cada etapa é uma invocação separada.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// xrfjob: registra leituras XRF simuladas no serviço de acompanhamento de jobs.
#[derive(Debug, Parser)]
#[command(name = "xrfjob", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./xrfjob.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita logs de depuração (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Busca os itens de um job (etapa 1).
    Fetch {
        /// Número da requisição.
        #[arg(long = "request")]
        request_num: String,

        /// Número do job.
        #[arg(long = "job")]
        job_num: String,

        /// Seletor de máquina, ex.: machine1.
        #[arg(long)]
        machine: String,
    },

    /// Gera duas leituras por item buscado (etapa 2).
    Generate,

    /// Envia as leituras geradas e as arquiva (etapa 3).
    Submit,

    /// Mostra a etapa do job em andamento.
    Status,

    /// Descarta o job em cache e volta para IDLE.
    Reset,
}
