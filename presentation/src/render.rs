use colored::Colorize;
use domain::models::{Document, RagStats};
use domain::session::{Message, Role, STRUCTURED_HEADING_MARKER};
use domain::store::AppState;

const PREVIEW_TITLE: &str = "Trabalho Acadêmico";
const PREVIEW_FOOTER: &str = "Formatado automaticamente segundo as normas ABNT.";
const PENDING_SECTION: &str = "Aguardando geração do conteúdo...";
const BODY_INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbntSection {
    pub title: String,
    pub body: String,
}

/// Structured agent reply split on its `###` headings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbntPreview {
    pub preamble: String,
    pub sections: Vec<AbntSection>,
}

impl AbntPreview {
    pub fn parse(content: &str) -> Self {
        let mut preamble = Vec::new();
        let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
        for line in content.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with(STRUCTURED_HEADING_MARKER) {
                let title = strip_numbering(trimmed.trim_start_matches('#').trim());
                sections.push((title.to_string(), Vec::new()));
            } else if let Some((_, body)) = sections.last_mut() {
                body.push(line);
            } else {
                preamble.push(line);
            }
        }
        Self {
            preamble: preamble.join("\n").trim().to_string(),
            sections: sections
                .into_iter()
                .map(|(title, body)| AbntSection {
                    title,
                    body: body.join("\n").trim().to_string(),
                })
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\n{}\n\n", PREVIEW_TITLE.to_uppercase().bold()));
        if !self.preamble.is_empty() {
            out.push_str(&indent(&self.preamble));
            out.push_str("\n\n");
        }
        for (i, section) in self.sections.iter().enumerate() {
            let heading = format!("{}. {}", i + 1, section.title.to_uppercase());
            out.push_str(&format!("{}\n", heading.bold()));
            let body = if section.body.is_empty() {
                PENDING_SECTION.italic().to_string()
            } else {
                section.body.clone()
            };
            out.push_str(&indent(&body));
            out.push_str("\n\n");
        }
        out.push_str(&format!("{}\n", PREVIEW_FOOTER.dimmed()));
        out
    }
}

/// Drops a leading "1." / "2.3" style number the model sometimes adds itself.
fn strip_numbering(title: &str) -> &str {
    let rest = title.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
    if rest.len() != title.len() && rest.starts_with(' ') {
        rest.trim_start()
    } else {
        title
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{BODY_INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn speaker_label(role: Role, agent: &str) -> String {
    match role {
        Role::Human => "Você".blue().bold().to_string(),
        Role::Agent => format!("Agente {agent}").green().bold().to_string(),
    }
}

/// Full rendering of a finished message.
pub fn render_message(message: &Message, agent: &str) -> String {
    let label = speaker_label(message.role, agent);
    if message.is_structured() {
        format!("{label}\n{}", AbntPreview::parse(&message.content).render())
    } else {
        format!("{label}\n{}\n", message.content)
    }
}

pub fn render_documents(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "Seu corpus está vazio. Use /upload <arquivo> para começar.\n"
            .dimmed()
            .to_string();
    }
    let mut out = format!("{} ({})\n", "Corpus Acadêmico".bold(), documents.len());
    for (i, doc) in documents.iter().enumerate() {
        out.push_str(&format!(
            "  {} {:<5} {}  {}\n",
            format!("[{}]", i + 1).blue(),
            doc.kind.as_str(),
            doc.name,
            format_size(doc.size_bytes).dimmed()
        ));
    }
    out
}

pub fn render_rag_stats(stats: &RagStats) -> String {
    let mut out = format!("{}\n", "Status da Memória RAG".bold());
    out.push_str(&format!("  Chunks: {}\n", stats.total_chunks));
    out.push_str(&format!("  Docs: {}\n", stats.indexed_documents));
    out.push_str(&format!(
        "  Média chars/chunk: {}\n",
        stats.mean_chars_per_chunk.round() as u64
    ));
    if let Some(skipped) = stats.skipped_documents.filter(|n| *n > 0) {
        out.push_str(&format!("  Ignorados: {skipped}\n"));
    }
    out
}

pub fn render_status(state: &AppState) -> String {
    let session = state.session_id.as_deref().unwrap_or("-");
    let mut out = format!(
        "Sessão {}  ·  Agente {}  ·  {} documento(s)\n",
        session.cyan(),
        state.active_agent.green(),
        state.documents.len()
    );
    if let Some(doc_id) = &state.active_doc_id {
        out.push_str(&format!("Documento ativo: {doc_id}\n"));
    }
    if state.is_uploading {
        out.push_str(&format!("{} upload(s) em andamento\n", state.upload_count));
    }
    out
}

fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let bytes_f = bytes as f64;
    if bytes_f >= KIB * KIB {
        format!("{:.1} MB", bytes_f / (KIB * KIB))
    } else if bytes_f >= KIB {
        format!("{:.1} KB", bytes_f / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Prints an agent reply as it grows, from successive store snapshots.
///
/// Only the message at `index` is followed. Content only ever grows by
/// appending while a reply streams, so the unseen suffix is all that needs
/// printing.
#[derive(Debug)]
pub struct StreamPrinter {
    index: usize,
    printed: usize,
    started: bool,
}

impl StreamPrinter {
    /// `baseline` is the transcript length before the turn started. The
    /// human message lands at `baseline` and the reply right after it.
    pub fn new(baseline: usize) -> Self {
        Self {
            index: baseline + 1,
            printed: 0,
            started: false,
        }
    }

    /// Text to print for this snapshot, if any.
    pub fn update(&mut self, state: &AppState) -> Option<String> {
        let message = state.messages.get(self.index).filter(|m| m.is_agent())?;
        let mut out = String::new();
        if !self.started {
            self.started = true;
            out.push_str(&speaker_label(Role::Agent, &state.active_agent));
            out.push('\n');
        }
        if let Some(fresh) = message.content.get(self.printed..) {
            out.push_str(fresh);
            self.printed = message.content.len();
        }
        (!out.is_empty()).then_some(out)
    }

    pub fn started(&self) -> bool {
        self.started
    }
}
