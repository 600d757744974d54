use aps_issues::auth::SystemBrowser;
use aps_issues::export::{self, ExportFormat};
use aps_issues::{
    ApsClient, ApsConfig, ApsError, ApsResult, ErrorKind, Issue, IssueFilters, Session, TokenKind,
    TokenManager,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// APS Issues CLI - busca e exporta issues da Autodesk Platform Services
#[derive(Parser)]
#[command(name = "aps-issues")]
#[command(version)]
#[command(about = "CLI para buscar, filtrar e exportar issues da APS", long_about = None)]
struct Cli {
    /// Formato de saída (json, pretty)
    #[arg(short = 'o', long, default_value = "pretty", global = true)]
    output: OutputFormat,

    /// Tempo máximo de espera pelo login no navegador, em segundos
    #[arg(long, global = true)]
    consent_timeout: Option<u64>,

    /// Modo verbose para debug
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Comando a executar
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, PartialEq)]
enum OutputFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "pretty" => Ok(OutputFormat::Pretty),
            _ => Err(format!("Formato desconhecido: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Autentica (2-legged e login 3-legged no navegador) e mostra o estado da sessão
    Auth {
        /// Apenas o token de aplicação, sem login do usuário
        #[arg(long)]
        two_legged_only: bool,
    },

    /// Lista os hubs acessíveis
    Hubs,

    /// Lista os projetos de um hub
    Projects {
        /// ID do hub (ex.: b.1234...)
        #[arg(long)]
        hub: String,
    },

    /// Lista os tipos de issue ativos de um projeto
    IssueTypes {
        /// ID do projeto (ex.: b.abcd...)
        #[arg(short = 'p', long)]
        project: String,

        /// ID do hub, para resolver o container pelos escopos do projeto
        #[arg(long)]
        hub: Option<String>,
    },

    /// Busca issues de um projeto, com filtros e exportação opcionais
    Issues {
        /// ID do projeto (ex.: b.abcd...)
        #[arg(short = 'p', long)]
        project: String,

        /// ID do hub, para resolver o container pelos escopos do projeto
        #[arg(long)]
        hub: Option<String>,

        /// Filtra por ID do tipo de issue
        #[arg(short = 't', long)]
        issue_type: Option<String>,

        /// Filtra por status (open, closed, in_progress, resolved)
        #[arg(short = 's', long)]
        status: Option<String>,

        /// Arquivo de destino da exportação (sobrescrito se existir)
        #[arg(short = 'e', long)]
        export: Option<PathBuf>,

        /// Formato da exportação (csv, xlsx); padrão pela extensão do arquivo
        #[arg(short = 'f', long)]
        format: Option<ExportFormat>,
    },
}

#[derive(serde::Serialize)]
struct CliResponse {
    success: bool,
    data: Option<serde_json::Value>,
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

impl CliResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    fn error(err: &ApsError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.user_message()),
            kind: Some(err.kind()),
        }
    }
}

/// Ctrl-C cancela o login pendente no navegador; fora dele encerra o processo
#[derive(Clone, Default)]
struct Interrupt {
    cancel: CancellationToken,
    consent_pending: Arc<AtomicBool>,
}

#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    CancelConsent,
    Exit,
}

/// Marca o login em andamento enquanto viver
struct ConsentScope<'a>(&'a AtomicBool);

impl Drop for ConsentScope<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Interrupt {
    fn on_ctrl_c(&self) -> InterruptAction {
        if self.consent_pending.load(Ordering::SeqCst) {
            self.cancel.cancel();
            InterruptAction::CancelConsent
        } else {
            InterruptAction::Exit
        }
    }

    fn consent(&self) -> ConsentScope<'_> {
        self.consent_pending.store(true, Ordering::SeqCst);
        ConsentScope(&self.consent_pending)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configura logging
    if cli.verbose {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("debug")
        ).init();
    } else {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("error")
        ).init();
    }

    // Configuração ausente encerra antes de qualquer interação
    let config = match ApsConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Erro: {}", e);
            eprintln!("   Defina APS_CLIENT_ID e APS_CLIENT_SECRET no ambiente ou no arquivo .env");
            std::process::exit(exit_code(&e));
        }
    };

    let interrupt = Interrupt::default();
    let listener = interrupt.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if listener.on_ctrl_c() == InterruptAction::Exit {
                eprintln!("⛔ Interrompido");
                std::process::exit(130);
            }
        }
    });

    let output_format = cli.output.clone();

    match execute_command(&cli, config, &interrupt).await {
        Ok(response) => {
            output_response(response, &output_format);
            std::process::exit(0);
        }
        Err(e) => {
            let code = exit_code(&e);
            output_response(CliResponse::error(&e), &output_format);
            std::process::exit(code);
        }
    }
}

fn exit_code(err: &ApsError) -> i32 {
    match err.kind() {
        ErrorKind::Config => 2,
        _ => 1,
    }
}

async fn execute_command(cli: &Cli, config: ApsConfig, interrupt: &Interrupt) -> ApsResult<CliResponse> {
    let config = match cli.consent_timeout {
        Some(secs) => config.with_consent_timeout(Duration::from_secs(secs)),
        None => config,
    };
    let mut session = Session::from_credentials(&config.credentials);
    let client = ApsClient::new(TokenManager::new(config)?)?;

    match &cli.command {
        Commands::Auth { two_legged_only } => {
            let token = client.token_manager().acquire_2legged().await?;
            session.store_token(token);

            if !two_legged_only {
                login(&client, &mut session, interrupt).await?;
            }

            let tokens: Vec<_> = [TokenKind::TwoLegged, TokenKind::ThreeLegged]
                .iter()
                .filter_map(|kind| session.token(*kind))
                .map(|token| json!({
                    "kind": token.kind,
                    "preview": token.preview(),
                    "expires_in_secs": token.time_to_expiry(),
                    "refreshable": token.can_refresh(),
                }))
                .collect();

            Ok(CliResponse::success(json!({
                "session": session.flags(),
                "tokens": tokens,
            })))
        }

        Commands::Hubs => {
            let hubs = client.list_hubs(&mut session).await?;
            if hubs.is_empty() {
                return Ok(CliResponse::success(json!({
                    "hubs": [],
                    "message": "Nenhum hub encontrado para esta conta",
                })));
            }
            Ok(CliResponse::success(json!({ "hubs": hubs })))
        }

        Commands::Projects { hub } => {
            let projects = client.list_projects(&mut session, hub).await?;
            Ok(CliResponse::success(json!({ "hub": hub, "projects": projects })))
        }

        Commands::IssueTypes { project, hub } => {
            ensure_three_legged(&client, &mut session, interrupt).await?;
            let container = container_for(&client, &mut session, project, hub.as_deref()).await?;
            let issue_types = client.list_issue_types(&mut session, &container).await?;
            Ok(CliResponse::success(json!({ "project": project, "issue_types": issue_types })))
        }

        Commands::Issues { project, hub, issue_type, status, export: export_path, format } => {
            ensure_three_legged(&client, &mut session, interrupt).await?;
            let container = container_for(&client, &mut session, project, hub.as_deref()).await?;

            let filters = IssueFilters::new(issue_type.clone(), status.clone());
            let issues = client.list_issues(&mut session, &container, &filters).await?;
            let limit_reached = session.loaded_issues().map_or(false, |loaded| loaded.limit_reached);

            let mut data = json!({
                "project": project,
                "filters": filters,
                "count": issues.len(),
                "limit_reached": limit_reached,
                "summary": summarize(&issues),
            });

            match export_path {
                Some(destination) => {
                    let format = format.unwrap_or_else(|| format_for_path(destination));
                    export::export(&issues, format, destination)?;
                    data["exported_to"] = json!(destination.display().to_string());
                    data["format"] = json!(format);
                }
                None => {
                    data["issues"] = issues.iter().map(Issue::to_json).collect();
                }
            }

            Ok(CliResponse::success(data))
        }
    }
}

/// Login 3-legged no navegador do sistema
async fn login(client: &ApsClient, session: &mut Session, interrupt: &Interrupt) -> ApsResult<()> {
    eprintln!("🌐 Abrindo o navegador para login na Autodesk (Ctrl-C cancela)...");
    let _consent = interrupt.consent();
    let token = client
        .token_manager()
        .acquire_3legged(&SystemBrowser, &interrupt.cancel)
        .await?;
    session.store_token(token);
    Ok(())
}

async fn ensure_three_legged(client: &ApsClient, session: &mut Session, interrupt: &Interrupt) -> ApsResult<()> {
    if session.has_three_legged() {
        return Ok(());
    }
    login(client, session, interrupt).await
}

async fn container_for(
    client: &ApsClient,
    session: &mut Session,
    project: &str,
    hub: Option<&str>,
) -> ApsResult<String> {
    match hub {
        Some(hub) => client.resolve_container(session, hub, project).await,
        None => Ok(project.to_string()),
    }
}

fn format_for_path(path: &Path) -> ExportFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ExportFormat::Spreadsheet,
        _ => ExportFormat::Csv,
    }
}

/// Totais por status e quantidade de tipos distintos
fn summarize(issues: &[Issue]) -> serde_json::Value {
    let mut by_status: BTreeMap<&str, usize> = BTreeMap::new();
    let mut types = std::collections::BTreeSet::new();
    for issue in issues {
        *by_status.entry(issue.status().unwrap_or("unknown")).or_default() += 1;
        if let Some(issue_type) = issue.issue_type_id() {
            types.insert(issue_type);
        }
    }
    json!({
        "total": issues.len(),
        "by_status": by_status,
        "issue_types": types.len(),
    })
}

fn output_response(response: CliResponse, format: &OutputFormat) {
    match format {
        OutputFormat::Json => {
            let body = serde_json::to_string(&response)
                .unwrap_or_else(|e| format!("{{\"success\":false,\"error\":\"{}\"}}", e));
            println!("{}", body);
        }
        OutputFormat::Pretty => {
            if response.success {
                if let Some(data) = response.data {
                    println!("✅ Sucesso!");
                    println!("{}", serde_json::to_string_pretty(&data).unwrap_or_default());
                }
            } else if let Some(error) = response.error {
                eprintln!("❌ Erro: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_issues_command() {
        let cli = Cli::parse_from([
            "aps-issues", "issues", "--project", "b.p1", "--status", "open", "--export", "out.xlsx",
        ]);
        match cli.command {
            Commands::Issues { project, status, export, format, .. } => {
                assert_eq!(project, "b.p1");
                assert_eq!(status.as_deref(), Some("open"));
                assert_eq!(format, None);
                assert_eq!(format_for_path(&export.unwrap()), ExportFormat::Spreadsheet);
            }
            _ => panic!("comando inesperado"),
        }
    }

    #[test]
    fn test_ctrl_c_cancels_only_a_pending_consent() {
        let interrupt = Interrupt::default();
        assert_eq!(interrupt.on_ctrl_c(), InterruptAction::Exit);
        assert!(!interrupt.cancel.is_cancelled());

        {
            let _consent = interrupt.consent();
            assert_eq!(interrupt.on_ctrl_c(), InterruptAction::CancelConsent);
            assert!(interrupt.cancel.is_cancelled());
        }

        assert_eq!(interrupt.on_ctrl_c(), InterruptAction::Exit);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&ApsError::config_error("x")), 2);
        assert_eq!(exit_code(&ApsError::not_found("x")), 1);
    }

    #[test]
    fn test_summarize() {
        let issues = vec![
            Issue::new("1").with_field("status", json!("open")).with_field("issueTypeId", json!("a")),
            Issue::new("2").with_field("status", json!("open")).with_field("issueTypeId", json!("b")),
            Issue::new("3").with_field("status", json!("closed")),
        ];
        let summary = summarize(&issues);
        assert_eq!(summary["total"], 3);
        assert_eq!(summary["by_status"]["open"], 2);
        assert_eq!(summary["issue_types"], 2);
    }
}
