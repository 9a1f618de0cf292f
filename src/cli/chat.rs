//! Assemble a runner from CLI flags and drive it.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::output::console_sink;
use super::ChatArgs;
use crate::agent_loop::{ConversationRunner, RunExit, RunnerOptions};
use crate::config::ParleyConfig;
use crate::error::Result;
use crate::interaction::{Interaction, TerminalInteraction};
use crate::memory::{memory_tools, Embedder, OpenAiEmbedder, VectorDatabase, VectorStore};
use crate::messenger::Messenger;
use crate::models::LanguageModel;
use crate::provider::create_provider;
use crate::storage::{
    ConversationId, FileBackend, SqliteBackend, StorageBackend, TransientBackend,
};
use crate::tools::{builtin, load_manifest, ToolSet};
use crate::types::Message;
use crate::util::trim_lines;

/// System prompt used when neither `--system` nor the config file sets one.
pub fn default_system_prompt(cwd: &Path) -> String {
    trim_lines(&format!(
        r#"
        You are an assistant that answers the user's questions.
        Use the available tools whenever they help you answer.
        If the user only sends a URL, read it and summarize its content.

        <environment>
          pwd: {}
        </environment>
        "#,
        cwd.display()
    ))
}

/// Tools in registration order: builtin, manifests, memory.
pub fn assemble_tools(
    args: &ChatArgs,
    interaction: Arc<dyn Interaction>,
    memory: Option<Arc<dyn VectorStore>>,
) -> Result<ToolSet> {
    let mut tools = ToolSet::new();
    if !args.no_builtin {
        tools.extend(builtin::all_tools(interaction.clone()));
    }
    for manifest in &args.tools {
        tools.extend(load_manifest(manifest, interaction.clone())?);
    }
    if let Some(store) = memory {
        tools.extend(memory_tools(store));
    }
    Ok(tools)
}

async fn open_memory(args: &ChatArgs, config: &ParleyConfig) -> Result<Option<VectorDatabase>> {
    if !args.memory {
        return Ok(None);
    }
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::from_config(config)?);
    let path = args.db.clone().unwrap_or_else(|| config.default_db_path());
    debug!(path = %path.display(), "opening memory database");
    Ok(Some(VectorDatabase::open(path, embedder).await?))
}

async fn open_backend(
    args: &ChatArgs,
    memory: Option<&VectorDatabase>,
) -> Result<(Box<dyn StorageBackend>, Option<ConversationId>)> {
    let chat = args.chat.clone().map(ConversationId::from);
    if let Some(path) = &args.persist {
        let id = chat.unwrap_or_else(|| ConversationId::from(path.to_string_lossy().as_ref()));
        return Ok((Box::new(FileBackend::new(path)), Some(id)));
    }
    if let Some(vdb) = memory.filter(|_| args.db.is_some()) {
        return Ok((Box::new(vdb.backend().await?), chat));
    }
    if let Some(path) = &args.db {
        return Ok((Box::new(SqliteBackend::open(path).await?), chat));
    }
    Ok((Box::new(TransientBackend::new()), chat))
}

/// Run the interactive session described by `args`.
pub async fn handle_chat(args: ChatArgs) -> Result<RunExit> {
    let config = ParleyConfig::load()?;
    let model: LanguageModel = args
        .model
        .as_deref()
        .unwrap_or_else(|| config.model())
        .parse()?;
    let provider = create_provider(&model, &config)?;

    let terminal = TerminalInteraction::new();
    let interaction: Arc<dyn Interaction> = Arc::new(terminal.clone());

    let memory = open_memory(&args, &config).await?;
    let store = memory
        .as_ref()
        .map(|vdb| Arc::new(vdb.store().clone()) as Arc<dyn VectorStore>);
    let tools = assemble_tools(&args, interaction.clone(), store)?;

    let (backend, chat_id) = open_backend(&args, memory.as_ref()).await?;
    let mut messenger = Messenger::from_boxed(backend);
    messenger.load(chat_id.as_ref()).await?;
    if let Some(id) = messenger.conversation().map(|c| c.id.clone()) {
        info!(conversation = %id, "conversation ready");
        if args.debug {
            eprintln!("[conversation] {id}");
        }
    }
    if let Some(text) = args.first_message() {
        messenger.add(vec![Message::user(text)]).await?;
    }

    let system = match args.system.clone().or_else(|| config.settings.system.clone()) {
        Some(system) => system,
        None => default_system_prompt(&std::env::current_dir()?),
    };
    let options = RunnerOptions::default()
        .with_system(system)
        .with_max_steps(args.max_steps.unwrap_or_else(|| config.max_steps()))
        .with_max_tokens(args.max_tokens.or(config.settings.max_tokens))
        .with_oneshot(args.oneshot);

    if args.debug {
        eprintln!("[model] {model}");
        eprintln!("[tools] {:?}", tools.names());
        eprintln!("[messages] {}", messenger.len());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut runner = ConversationRunner::new(provider, tools, options)
        .with_event_sink(console_sink(args.debug))
        .with_cancellation(cancel);
    let exit = runner.run(&mut messenger, &terminal).await?;
    debug!(%exit, "session ended");
    Ok(exit)
}
