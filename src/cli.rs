//! # Terminal Front-End
//!
//! Line-oriented commands over a [`PantryService`], and a [`UserPrompt`] that
//! asks its questions on the same input stream. Everything shown to the user
//! goes through [`LocalizationManager`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::Mutex;
use tracing::debug;

use crate::availability::Availability;
use crate::bulk_combine::BatchSummary;
use crate::combine::COMBINE_NOT_CONFIGURED;
use crate::errors::PantryError;
use crate::inventory_model::{format_quantity, BatchDecision, InventoryItem, MergeDecision};
use crate::localization::LocalizationManager;
use crate::merge_policy::UnitConflict;
use crate::pantry_service::{AddOutcome, BatchOutcome, PantryService};
use crate::prompt::UserPrompt;
use crate::quick_add::{parse_line, parse_list, parse_quantity};
use crate::store::InventoryStore;

/// A parsed command line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Add(String),
    Batch(String),
    /// 1-based position in the listing
    Remove(usize),
    Use {
        index: usize,
        quantity: f64,
        unit: String,
    },
    Check(String),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parse one input line
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match (verb.to_lowercase().as_str(), rest.is_empty()) {
        ("list" | "ls", _) => Command::List,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit" | "q", _) => Command::Quit,
        ("add", false) => Command::Add(rest.to_string()),
        ("batch", false) => Command::Batch(rest.to_string()),
        ("check", false) => Command::Check(rest.to_string()),
        ("remove" | "rm", false) => rest
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Command::Remove)
            .unwrap_or_else(|| Command::Unknown(line.to_string())),
        ("use", false) => parse_use(rest).unwrap_or_else(|| Command::Unknown(line.to_string())),
        _ => Command::Unknown(line.to_string()),
    }
}

fn parse_use(rest: &str) -> Option<Command> {
    let mut parts = rest.split_whitespace();
    let index = parts.next()?.parse::<usize>().ok().filter(|n| *n > 0)?;
    let quantity = parse_quantity(parts.next()?)?;
    let unit = parts.collect::<Vec<_>>().join(" ");
    if unit.is_empty() {
        return None;
    }
    Some(Command::Use {
        index,
        quantity,
        unit,
    })
}

/// `"1"` or `"2"` picks an option, anything else dismisses
pub fn parse_choice(answer: &str) -> Option<u8> {
    match answer.trim() {
        "1" => Some(1),
        "2" => Some(2),
        _ => None,
    }
}

fn amount(item: &InventoryItem) -> String {
    format!("{} {}", format_quantity(item.display_quantity()), item.unit)
}

/// Text of the single-item unit conflict prompt
pub fn render_conflict(l10n: &LocalizationManager, conflict: &UnitConflict) -> String {
    let converted = format!(
        "{} {}",
        format_quantity(conflict.converted_quantity),
        conflict.existing.unit
    );
    [
        l10n.message_with_args("prompt-unit-conflict-title", &[("name", &conflict.existing.name)]),
        l10n.message_with_args(
            "prompt-unit-conflict-body",
            &[
                ("existing", &amount(&conflict.existing)),
                ("incoming", &amount(&conflict.incoming)),
                ("converted", &converted),
            ],
        ),
        l10n.message_with_args(
            "prompt-choice",
            &[
                ("first", &l10n.message("option-keep-separate")),
                ("second", &l10n.message("option-convert-combine")),
            ],
        ),
    ]
    .join("\n")
}

/// Text of the batch duplicate prompt
pub fn render_batch(l10n: &LocalizationManager, summary: &BatchSummary) -> String {
    let mut lines = vec![l10n.message_with_args(
        "prompt-batch-title",
        &[
            ("duplicates", &summary.duplicates.len().to_string()),
            ("total", &summary.batch_size.to_string()),
        ],
    )];
    for pair in &summary.duplicates {
        lines.push(format!(
            "  {}",
            l10n.message_with_args(
                "prompt-batch-line",
                &[
                    ("incoming", &pair.incoming.to_string()),
                    ("existing", &amount(&pair.existing)),
                ],
            )
        ));
    }
    lines.push(l10n.message_with_args(
        "prompt-choice",
        &[
            ("first", &l10n.message("option-keep-separate")),
            ("second", &l10n.message("option-combine-all")),
        ],
    ));
    lines.join("\n")
}

pub fn describe_error(l10n: &LocalizationManager, error: &PantryError) -> String {
    match error {
        PantryError::NotFound(_) => l10n.message("error-not-found"),
        e if e.is_retryable() => l10n.message_with_args("error-retryable", &[("error", &e.to_string())]),
        e => l10n.message_with_args("error-invalid", &[("error", &e.to_string())]),
    }
}

pub fn describe_add(l10n: &LocalizationManager, outcome: &AddOutcome) -> String {
    match outcome {
        AddOutcome::Inserted(item) => l10n.message_with_args("outcome-inserted", &[("item", &item.to_string())]),
        AddOutcome::Combined(item) => l10n.message_with_args("outcome-combined", &[("item", &item.to_string())]),
        AddOutcome::Dismissed => l10n.message("outcome-dismissed"),
        AddOutcome::Incomplete(issue) => l10n.message(issue.message_key()),
    }
}

pub fn describe_batch(l10n: &LocalizationManager, outcome: &BatchOutcome) -> String {
    let mut lines = Vec::new();
    for (item, issue) in &outcome.skipped {
        lines.push(l10n.message_with_args(
            "batch-skipped",
            &[("item", &item.name), ("reason", &l10n.message(issue.message_key()))],
        ));
    }
    for item in outcome.updated.iter() {
        lines.push(l10n.message_with_args("outcome-combined", &[("item", &item.to_string())]));
    }
    for item in outcome.inserted.iter() {
        lines.push(l10n.message_with_args("outcome-inserted", &[("item", &item.to_string())]));
    }
    match outcome.warning.as_deref() {
        Some(COMBINE_NOT_CONFIGURED) => lines.push(l10n.message("batch-warning-not-configured")),
        Some(reason) => lines.push(l10n.message_with_args("batch-warning", &[("reason", reason)])),
        None => {}
    }
    for failure in &outcome.failures {
        lines.push(l10n.message_with_args(
            "batch-failure",
            &[("item", &failure.item), ("error", &describe_error(l10n, &failure.error))],
        ));
    }
    lines.push(l10n.message_with_args(
        "batch-summary",
        &[
            ("added", &outcome.inserted.len().to_string()),
            ("updated", &outcome.updated.len().to_string()),
        ],
    ));
    lines.join("\n")
}

pub fn describe_availability(l10n: &LocalizationManager, required: &InventoryItem, availability: &Availability) -> String {
    let item = required.to_string();
    let in_unit = |q: f64| format!("{} {}", format_quantity(q), required.unit);
    match availability {
        Availability::Sufficient { available } => l10n.message_with_args(
            "availability-sufficient",
            &[("item", &item), ("available", &in_unit(*available))],
        ),
        Availability::Insufficient { available, missing } => l10n.message_with_args(
            "availability-insufficient",
            &[
                ("item", &item),
                ("available", &in_unit(*available)),
                ("missing", &in_unit(*missing)),
            ],
        ),
        Availability::Missing => l10n.message_with_args("availability-missing", &[("item", &required.name)]),
        Availability::Incomparable { units } => l10n.message_with_args(
            "availability-incomparable",
            &[("item", &required.name), ("units", &units.join(", "))],
        ),
    }
}

pub fn render_list(l10n: &LocalizationManager, items: &[InventoryItem]) -> String {
    if items.is_empty() {
        return l10n.message("list-empty");
    }
    let mut lines = vec![l10n.message("list-header")];
    lines.extend(
        items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{:>3}. {}", i + 1, item)),
    );
    lines.join("\n")
}

/// Input lines shared by the command loop and the prompt
pub type SharedLines<R> = Arc<Mutex<Lines<R>>>;

/// Prompt that prints to stdout and reads the answer from the shared input
pub struct TerminalPrompt<R> {
    lines: SharedLines<R>,
    l10n: Arc<LocalizationManager>,
}

impl<R: AsyncBufRead + Unpin + Send> TerminalPrompt<R> {
    pub fn new(lines: SharedLines<R>, l10n: Arc<LocalizationManager>) -> Self {
        Self { lines, l10n }
    }

    async fn ask(&self, text: &str) -> Option<u8> {
        println!("{text}");
        let answer = match self.lines.lock().await.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "Failed to read prompt answer");
                return None;
            }
        };
        parse_choice(&answer)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> UserPrompt for TerminalPrompt<R> {
    async fn resolve_unit_conflict(&self, conflict: &UnitConflict) -> Option<MergeDecision> {
        match self.ask(&render_conflict(&self.l10n, conflict)).await? {
            1 => Some(MergeDecision::KeepSeparate),
            2 => Some(MergeDecision::ConvertAndCombine),
            _ => None,
        }
    }

    async fn choose_batch_action(&self, summary: &BatchSummary) -> Option<BatchDecision> {
        match self.ask(&render_batch(&self.l10n, summary)).await? {
            1 => Some(BatchDecision::KeepSeparateAll),
            2 => Some(BatchDecision::CombineAllViaAi),
            _ => None,
        }
    }
}

/// Reply to one command
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub quit: bool,
}

impl Reply {
    fn text(text: String) -> Self {
        Self { text, quit: false }
    }
}

fn item_id(items: &[InventoryItem], index: usize) -> Option<String> {
    items.get(index.checked_sub(1)?)?.id.clone()
}

/// Run one command against the service
pub async fn execute<S: InventoryStore>(
    service: &mut PantryService<S>,
    prompt: &dyn UserPrompt,
    l10n: &LocalizationManager,
    command: Command,
) -> Reply {
    match command {
        Command::Empty => Reply::text(String::new()),
        Command::Help => Reply::text(l10n.message("help")),
        Command::Quit => Reply {
            text: l10n.message("goodbye"),
            quit: true,
        },
        Command::Unknown(command) => {
            Reply::text(l10n.message_with_args("unknown-command", &[("command", &command)]))
        }
        Command::List => Reply::text(render_list(l10n, service.items())),
        Command::Add(text) => {
            let Some(item) = parse_line(service.units(), &text) else {
                return Reply::text(l10n.message_with_args("unparsed-line", &[("line", &text)]));
            };
            match service.add_item(&item, prompt).await {
                Ok(outcome) => Reply::text(describe_add(l10n, &outcome)),
                Err(e) => Reply::text(describe_error(l10n, &e)),
            }
        }
        Command::Batch(text) => {
            let parsed = parse_list(service.units(), &text);
            let mut lines: Vec<String> = parsed
                .unparsed
                .iter()
                .map(|line| l10n.message_with_args("unparsed-line", &[("line", line)]))
                .collect();
            if !parsed.items.is_empty() {
                let outcome = service.add_batch(&parsed.items, prompt).await;
                lines.push(describe_batch(l10n, &outcome));
            }
            Reply::text(lines.join("\n"))
        }
        Command::Remove(index) => {
            let Some(id) = item_id(service.items(), index) else {
                return Reply::text(l10n.message("error-not-found"));
            };
            match service.remove_item(&id).await {
                Ok(item) => Reply::text(l10n.message_with_args("outcome-removed", &[("item", &item.name)])),
                Err(e) => Reply::text(describe_error(l10n, &e)),
            }
        }
        Command::Use {
            index,
            quantity,
            unit,
        } => {
            let Some(id) = item_id(service.items(), index) else {
                return Reply::text(l10n.message("error-not-found"));
            };
            match service.consume(&id, quantity, &unit).await {
                Ok(item) => Reply::text(l10n.message_with_args("outcome-consumed", &[("item", &item.to_string())])),
                Err(e) => Reply::text(describe_error(l10n, &e)),
            }
        }
        Command::Check(text) => {
            let parsed = parse_list(service.units(), &text);
            let mut lines: Vec<String> = parsed
                .unparsed
                .iter()
                .map(|line| l10n.message_with_args("unparsed-line", &[("line", line)]))
                .collect();
            for required in &parsed.items {
                let availability = service.check_availability(required);
                lines.push(describe_availability(l10n, required, &availability));
            }
            Reply::text(lines.join("\n"))
        }
    }
}

/// Read commands until `quit` or end of input
pub async fn run<S, R>(
    service: &mut PantryService<S>,
    lines: SharedLines<R>,
    l10n: Arc<LocalizationManager>,
) -> anyhow::Result<()>
where
    S: InventoryStore,
    R: AsyncBufRead + Unpin + Send,
{
    let prompt = TerminalPrompt::new(Arc::clone(&lines), Arc::clone(&l10n));
    println!("{}", render_list(&l10n, service.items()));

    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let line = lines.lock().await.next_line().await?;
        let Some(line) = line else {
            break;
        };

        let reply = execute(service, &prompt, &l10n, parse_command(&line)).await;
        if !reply.text.is_empty() {
            println!("{}", reply.text);
        }
        if reply.quit {
            break;
        }
    }
    Ok(())
}
