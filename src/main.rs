use anyhow::{bail, Context, Result as AnyhowResult};
use clap::Parser;
use qwx_parthistory::config::Config;
use qwx_parthistory::part_tree::{
    ExpandOutcome, FlatTreeProjector, ProjectorOptions, Subscription, Toggle, TreeEvent, TreeNode,
};
use qwx_parthistory::services::history::{
    HierarchySource, HistoryBackend, HistoryManager, SlowHistoryBackend,
};
use qwx_parthistory::services::tracing_setup;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "parthistory")]
#[command(about = "Browse the part-history tree as a flat row list", long_about = None)]
#[command(version)]
struct Args {
    /// Actions to run in order: expand:PATH, collapse:PATH or toggle:PATH,
    /// where PATH is a '/'-separated identity path from a root (e.g. Fruits/Apple)
    #[arg(value_name = "ACTIONS")]
    actions: Vec<Action>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file (default: stderr)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Override the simulated children fetch latency
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Expand,
    Collapse,
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Action {
    kind: ActionKind,
    path: Vec<String>,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, path) = s
            .split_once(':')
            .ok_or_else(|| format!("expected KIND:PATH, got '{s}'"))?;
        let kind = match kind {
            "expand" => ActionKind::Expand,
            "collapse" => ActionKind::Collapse,
            "toggle" => ActionKind::Toggle,
            other => return Err(format!("unknown action '{other}'")),
        };
        let path: Vec<String> = path
            .split('/')
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        if path.is_empty() {
            return Err(format!("action '{s}' has an empty path"));
        }
        Ok(Self { kind, path })
    }
}

fn load_config(args: &Args) -> AnyhowResult<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(delay) = args.delay_ms {
        config.latency.children_delay_ms = delay;
    }
    Ok(config)
}

async fn build_projector(config: &Config) -> AnyhowResult<FlatTreeProjector> {
    let source: Arc<dyn HistoryBackend> = Arc::new(HierarchySource::new(&config.hierarchy));
    let backend: Arc<dyn HistoryBackend> = if config.latency.is_zero() {
        source
    } else {
        Arc::new(SlowHistoryBackend::new(
            source,
            config.latency.to_slow_config(),
        ))
    };

    let manager = HistoryManager::new(backend).with_timeout(config.fetch_timeout());
    let options = ProjectorOptions {
        broadcast_loading: config.broadcast_loading,
    };
    FlatTreeProjector::initialize(manager, options)
        .await
        .context("Failed to load root parts")
}

fn render_row(node: &TreeNode) -> String {
    let marker = if !node.expandable {
        " "
    } else if node.is_loading {
        "…"
    } else if node.is_expanded {
        "▾"
    } else {
        "▸"
    };
    format!("{}{} {}", "  ".repeat(node.level), marker, node.item)
}

fn print_rows(rows: &[TreeNode]) {
    for node in rows {
        println!("{}", render_row(node));
    }
    println!();
}

fn report_failures(subscription: &mut Subscription) {
    while let Some(event) = subscription.try_recv() {
        if let TreeEvent::FetchFailed { item, error, .. } = event {
            eprintln!("error: {item}: {error}");
        }
    }
}

async fn run_action(projector: &FlatTreeProjector, action: &Action) -> AnyhowResult<()> {
    let (last, ancestors) = action
        .path
        .split_last()
        .context("action path is empty")?;

    let path: Vec<&str> = action.path.iter().map(String::as_str).collect();
    let Some(id) = projector.expand_path(&path).await else {
        bail!("part '{}' not found", action.path.join("/"));
    };
    tracing::info!(
        ?action,
        ancestors = ancestors.len(),
        "running action on '{}'",
        last
    );

    match action.kind {
        ActionKind::Expand => match projector.expand(id).await {
            ExpandOutcome::Failed(error) => tracing::warn!(%error, "expand failed"),
            outcome => tracing::debug!(?outcome, "expand finished"),
        },
        ActionKind::Collapse => {
            projector.collapse(id);
        }
        ActionKind::Toggle => {
            if let Toggle::Expand(ExpandOutcome::Failed(error)) = projector.toggle(id).await {
                tracing::warn!(%error, "toggle failed");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    tracing_setup::init_global(args.log_file.as_deref()).context("Failed to set up logging")?;

    let config = load_config(&args)?;
    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let projector = build_projector(&config).await?;
    let mut subscription = projector.subscribe();
    print_rows(&projector.snapshot());

    for action in &args.actions {
        run_action(&projector, action).await?;
        report_failures(&mut subscription);
        print_rows(&projector.snapshot());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qwx_parthistory::part_tree::NodeId;

    #[test]
    fn test_parse_action() {
        let action: Action = "expand:Fruits/Apple".parse().unwrap();
        assert_eq!(action.kind, ActionKind::Expand);
        assert_eq!(action.path, ["Fruits", "Apple"]);

        let action: Action = "toggle:/Vegetables/".parse().unwrap();
        assert_eq!(action.kind, ActionKind::Toggle);
        assert_eq!(action.path, ["Vegetables"]);
    }

    #[test]
    fn test_parse_action_errors() {
        assert!("Fruits".parse::<Action>().is_err());
        assert!("open:Fruits".parse::<Action>().is_err());
        assert!("collapse:".parse::<Action>().is_err());
    }

    #[test]
    fn test_render_row() {
        let mut node = TreeNode::new(NodeId(1), "Apple", 1, true);
        assert_eq!(render_row(&node), "  ▸ Apple");
        node.is_loading = true;
        assert_eq!(render_row(&node), "  … Apple");
        node.is_loading = false;
        node.is_expanded = true;
        assert_eq!(render_row(&node), "  ▾ Apple");
        assert_eq!(render_row(&TreeNode::new(NodeId(2), "Fuji", 2, false)), "      Fuji");
    }

    #[tokio::test]
    async fn test_run_actions_against_default_config() {
        let projector = build_projector(&Config::default()).await.unwrap();

        for action in ["expand:Fruits/Apple", "collapse:Fruits/Apple", "toggle:Vegetables"] {
            run_action(&projector, &action.parse().unwrap()).await.unwrap();
        }
        assert_eq!(projector.len(), 2 + 3 + 3);
        assert!(projector.find("Fuji").is_none());

        let missing: Action = "expand:Fruits/Kiwi".parse().unwrap();
        assert!(run_action(&projector, &missing).await.is_err());
    }
}
