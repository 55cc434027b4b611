use crate::render::{
    render_documents, render_message, render_rag_stats, render_status, AbntPreview, StreamPrinter,
};
use application::chat_service::{ChatService, TurnOutcome, TurnRejection};
use application::session_service::SessionService;
use application::upload_service::{UploadOutcome, UploadService};
use clap::{Parser, Subcommand};
use colored::Colorize;
use domain::store::Store;
use infrastructure::api_client::ApiClient;
use infrastructure::config::Config;
use shared::confirmation::{ask_confirmation, ask_line};
use shared::types::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "oraculo")]
#[command(about = "Terminal client for the Oráculo academic-writing assistant")]
pub struct Cli {
    /// Base URL of the agent API (overrides ORACULO_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Resume an existing session instead of creating a new one
    #[arg(long, global = true)]
    pub session: Option<String>,

    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Interactive chat (default)
    Chat {
        /// Files to upload before the first message
        #[arg(short, long = "upload")]
        uploads: Vec<PathBuf>,
    },
    /// Open a session and print its state
    Session,
    /// Upload documents into a session
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Send a single message and print the reply
    Ask {
        /// Files to upload before asking
        #[arg(short, long = "upload")]
        uploads: Vec<PathBuf>,

        #[arg(required = true, trailing_var_arg = true)]
        message: Vec<String>,
    },
}

const HELP: &str = "\
Comandos:
  /docs               lista os documentos enviados
  /history            reimprime a conversa
  /upload <arquivo>…  envia documentos para a sessão
  /remove <n|id>      remove um documento da lista
  /stats              mostra as estatísticas RAG
  /status             mostra sessão e agente ativo
  /refresh            sincroniza o estado da sessão
  /clear              apaga a conversa no servidor
  /reset              descarta o estado local
  /exit               sai";

pub struct CliApp {
    store: Store,
    sessions: SessionService<ApiClient>,
    chat: ChatService<ApiClient>,
    uploads: UploadService<ApiClient>,
}

impl CliApp {
    pub fn new(cli: &Cli) -> Result<Self> {
        let mut config = Config::load();
        if let Some(url) = &cli.api_url {
            config = config.with_api_base_url(url.clone());
        }
        tracing::debug!(target: "oraculo::cli", api = %config.api_base_url, "configuration loaded");

        let backend = Arc::new(ApiClient::new(&config)?);
        let store = Store::new();
        Ok(Self {
            sessions: SessionService::new(backend.clone(), store.clone()),
            chat: ChatService::new(backend.clone(), store.clone(), config.stream_idle_timeout),
            uploads: UploadService::new(backend, store.clone(), config.max_upload_bytes)
                .with_max_files(config.max_files),
            store,
        })
    }

    pub async fn run(&mut self, cli: Cli) -> Result<()> {
        self.sessions.bootstrap(cli.session.as_deref()).await?;
        match cli.command.unwrap_or(Command::Chat { uploads: Vec::new() }) {
            Command::Chat { uploads } => {
                self.handle_upload(&uploads).await;
                self.handle_chat().await
            }
            Command::Session => {
                print!("{}", render_status(&self.store.snapshot()));
                self.print_stats();
                Ok(())
            }
            Command::Upload { files } => {
                self.handle_upload(&files).await;
                self.print_stats();
                Ok(())
            }
            Command::Ask { uploads, message } => {
                self.handle_upload(&uploads).await;
                self.handle_turn(&message.join(" ")).await;
                Ok(())
            }
        }
    }

    async fn handle_chat(&mut self) -> Result<()> {
        print!("{}", render_status(&self.store.snapshot()));
        println!("{}", "Digite sua dúvida ou comando. /help lista os comandos.".dimmed());
        loop {
            let input = ask_line("Você")?;
            let trimmed = input.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
                break;
            }
            if let Some(command) = trimmed.strip_prefix('/') {
                if !self.handle_command(command).await? {
                    break;
                }
                continue;
            }
            self.handle_turn(&input).await;
        }
        Ok(())
    }

    /// Returns `false` when the REPL should stop.
    async fn handle_command(&mut self, command: &str) -> Result<bool> {
        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        match name {
            "exit" | "quit" => return Ok(false),
            "help" => println!("{HELP}"),
            "docs" => print!("{}", render_documents(&self.store.snapshot().documents)),
            "history" => {
                let state = self.store.snapshot();
                for message in &state.messages {
                    print!("{}", render_message(message, &state.active_agent));
                }
            }
            "upload" => {
                if args.is_empty() {
                    println!("{}", "Uso: /upload <arquivo> [arquivo…]".yellow());
                } else {
                    let files: Vec<PathBuf> = args.iter().map(PathBuf::from).collect();
                    self.handle_upload(&files).await;
                }
            }
            "remove" => self.handle_remove(args.first().copied()),
            "stats" => self.print_stats(),
            "status" => print!("{}", render_status(&self.store.snapshot())),
            "refresh" => match self.sessions.refresh().await {
                Ok(_) => print!("{}", render_status(&self.store.snapshot())),
                Err(err) => println!("{}", format!("Falha ao sincronizar: {err:#}").red()),
            },
            "clear" => {
                if ask_confirmation("Apagar a conversa desta sessão?", false)? {
                    match self.sessions.clear().await {
                        Ok(result) if result.success => println!("{}", "Conversa apagada.".green()),
                        Ok(result) => println!(
                            "{}",
                            format!(
                                "O servidor não apagou a conversa: {}",
                                result.detail.unwrap_or_default()
                            )
                            .yellow()
                        ),
                        Err(err) => println!("{}", format!("Falha ao apagar: {err:#}").red()),
                    }
                }
            }
            "reset" => {
                if ask_confirmation("Descartar todo o estado local e abrir uma nova sessão?", false)? {
                    self.sessions.reset();
                    self.sessions.bootstrap(None).await?;
                    print!("{}", render_status(&self.store.snapshot()));
                }
            }
            other => println!("{}", format!("Comando desconhecido: /{other}. Use /help.").yellow()),
        }
        Ok(true)
    }

    async fn handle_turn(&self, input: &str) {
        let baseline = self.store.select(|s| s.messages.len());
        let mut printer = StreamPrinter::new(baseline);
        let mut rx = self.store.subscribe();

        let turn = self.chat.send_message(input);
        tokio::pin!(turn);
        let outcome = loop {
            tokio::select! {
                outcome = &mut turn => break outcome,
                changed = rx.changed() => {
                    if changed.is_ok() {
                        let state = rx.borrow_and_update().clone();
                        emit(printer.update(&state));
                    }
                }
            }
        };
        let state = self.store.snapshot();
        emit(printer.update(&state));
        if printer.started() {
            println!();
        }

        match outcome {
            TurnOutcome::Completed { .. } => {
                if let Some(last) = state.last_message().filter(|m| m.is_structured()) {
                    print!("{}", AbntPreview::parse(&last.content).render());
                }
            }
            TurnOutcome::Rejected(rejection) => println!("{}", rejection_notice(rejection).yellow()),
            TurnOutcome::Failed { error } => {
                println!("{}", format!("A resposta do agente falhou: {error}").red())
            }
        }
    }

    async fn handle_upload(&self, files: &[PathBuf]) {
        if files.is_empty() {
            return;
        }
        println!("Enviando {} arquivo(s)...", files.len());
        for outcome in self.uploads.upload_many(files).await {
            match outcome {
                UploadOutcome::Indexed(doc) => {
                    println!("{}", format!("{} carregado com sucesso.", doc.name).green())
                }
                UploadOutcome::IndexedWithWarning { document, warning } => println!(
                    "{}",
                    format!("{}: documento salvo, mas erro ao indexar: {warning}", document.name)
                        .yellow()
                ),
                UploadOutcome::Failed { file_name, error } => {
                    println!("{}", format!("Falha ao carregar {file_name}: {error}").red())
                }
            }
        }
    }

    fn handle_remove(&self, target: Option<&str>) {
        let Some(target) = target else {
            println!("{}", "Uso: /remove <n|id>".yellow());
            return;
        };
        let documents = self.store.snapshot().documents;
        let id = target
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| documents.get(i))
            .map(|d| d.id.clone())
            .unwrap_or_else(|| target.to_string());
        if self.uploads.remove(&id) {
            println!("{}", "Documento removido da lista.".green());
        } else {
            println!("{}", format!("Nenhum documento {target}.").yellow());
        }
    }

    fn print_stats(&self) {
        match self.store.snapshot().rag_stats {
            Some(stats) => print!("{}", render_rag_stats(&stats)),
            None => println!("{}", "Nenhum documento indexado ainda.".dimmed()),
        }
    }
}

fn rejection_notice(rejection: TurnRejection) -> &'static str {
    match rejection {
        TurnRejection::EmptyInput => "Mensagem vazia.",
        TurnRejection::NoSession => "Nenhuma sessão ativa.",
        TurnRejection::Busy => "O agente ainda está respondendo.",
        TurnRejection::UploadInFlight => "Aguarde o carregamento dos documentos...",
    }
}

fn emit(text: Option<String>) {
    if let Some(text) = text {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }
}
