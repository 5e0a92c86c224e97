//! Configuração do xrfjob carregada a partir de `xrfjob.toml`.
//!
//! Todo campo tem um default, então um arquivo ausente ou parcial é aceito.
//! A variável de ambiente `XRFJOB_API_URL` tem precedência sobre o arquivo
//! para a URL base do serviço.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

pub const DEFAULT_CONFIG_FILE: &str = "xrfjob.toml";

/// Instrumento XRF conhecido pelo serviço.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MachineProfile {
    /// Nome do instrumento gravado no resumo do arquivo CSV.
    pub name: String,
    /// Corpo JSON que identifica o instrumento para o serviço.
    #[serde(default)]
    pub payload: Value,
}

/// Configuração de nível superior carregada de `xrfjob.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XrfConfig {
    /// URL base do serviço de acompanhamento de jobs.
    pub api_base_url: String,
    /// Caminho do endpoint de itens do job, relativo a `api_base_url`.
    pub fetch_path: String,
    /// Caminho do endpoint de envio das leituras.
    pub submit_path: String,
    /// Diretório dos slots do cache do job.
    pub cache_dir: PathBuf,
    /// Diretório que recebe os arquivos CSV por job.
    pub report_dir: PathBuf,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Seletores de máquina conhecidos, ex.: `machine1`.
    pub machines: BTreeMap<String, MachineProfile>,
}

// Máquinas padrão: machine1 e machine2.
fn default_machines() -> BTreeMap<String, MachineProfile> {
    BTreeMap::from([
        (
            "machine1".to_string(),
            MachineProfile {
                name: "MICROSPEC".to_string(),
                payload: json!({ "xrfmake": "MICROSPEC", "xrfmodel": "XRF-2000" }),
            },
        ),
        (
            "machine2".to_string(),
            MachineProfile {
                name: "FISCHER".to_string(),
                payload: json!({ "xrfmake": "FISCHER", "xrfmodel": "XAN 250" }),
            },
        ),
    ])
}

impl Default for XrfConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://huid.manakonline.in".to_string(),
            fetch_path: "MANAK/getxrfJobdetails".to_string(),
            submit_path: "MANAK/postxrfJobdetails".to_string(),
            cache_dir: PathBuf::from(".xrfjob/cache"),
            report_dir: PathBuf::from("reports"),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            machines: default_machines(),
        }
    }
}

impl XrfConfig {
    /// Carrega `path`, ou `xrfjob.toml` no diretório atual quando `None`.
    /// Usa os defaults se o arquivo padrão não existir; um caminho explícito
    /// precisa existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(url) = std::env::var("XRFJOB_API_URL")
            && !url.is_empty()
        {
            config.api_base_url = url;
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn machine(&self, selector: &str) -> Option<&MachineProfile> {
        self.machines.get(selector)
    }
}
