//! Command surface: `load`, `list`, `reload`, `help`.
//!
//! Commands come from anything implementing [`CommandSender`]; the engine
//! wires up the process console. Replies are rendered through the
//! message catalog, and a paste's outcome is reported back to whoever
//! asked for it.

use std::sync::Arc;

use autoschematic_core::config::ConfigStore;
use autoschematic_core::locate::SchematicLocator;
use autoschematic_core::messages::{MessageStore, strip_color_codes};
use autoschematic_core::options::PasteOptions;
use autoschematic_core::outcome::PasteHandle;
use autoschematic_core::paste::{PasteRequest, PasteScheduler};
use autoschematic_core::sink::{PasteNotice, ResultSink};
use autoschematic_types::BlockPos;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Permission required for `load`.
pub const LOAD_PERMISSION: &str = "autoschematic.load";

/// Permission required for `reload`.
pub const RELOAD_PERMISSION: &str = "autoschematic.reload";

/// Someone who can issue commands and receive replies.
pub trait CommandSender: Send + Sync {
    /// Deliver one rendered line.
    fn send(&self, line: &str);

    /// Where the sender stands, if it has a position in the world.
    fn position(&self) -> Option<BlockPos>;

    /// Whether the sender holds `permission`.
    fn has_permission(&self, permission: &str) -> bool;
}

/// Where a `load` should paste.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// At the sender's position.
    Here,
    /// At explicit coordinates, already floored.
    At(BlockPos),
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `load <file> [x,y,z|here]`.
    Load {
        /// Name or path to resolve.
        file: String,
        /// Explicit placement; `None` means the sender's position.
        placement: Option<Placement>,
    },
    /// `list`.
    List,
    /// `reload`.
    Reload,
    /// `help`, or nothing at all.
    Help,
    /// Anything else.
    Unknown(String),
}

/// Ways a command line can be rejected before it runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// `load` without a file name.
    #[error("missing file name")]
    LoadUsage,

    /// A placement that is neither `here` nor three numbers.
    #[error("invalid location: {input}")]
    InvalidLocation {
        /// The rejected argument.
        input: String,
    },
}

/// Parse `x,y,z` (decimals allowed, floored) or `here`.
pub fn parse_placement(input: &str) -> Result<Placement, CommandError> {
    if input.eq_ignore_ascii_case("here") {
        return Ok(Placement::Here);
    }
    let invalid = || CommandError::InvalidLocation {
        input: input.to_owned(),
    };
    let coords: Vec<f64> = input
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect::<Option<_>>()
        .ok_or_else(invalid)?;
    let [x, y, z] = coords.as_slice() else {
        return Err(invalid());
    };
    BlockPos::from_floored(*x, *y, *z)
        .map(Placement::At)
        .ok_or_else(invalid)
}

/// Parse one command line. Subcommands are case-insensitive.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let mut args = line.split_whitespace();
    let Some(name) = args.next() else {
        return Ok(Command::Help);
    };
    let command = match name.to_ascii_lowercase().as_str() {
        "help" => Command::Help,
        "list" => Command::List,
        "reload" => Command::Reload,
        "load" => {
            let file = args.next().ok_or(CommandError::LoadUsage)?.to_owned();
            let placement = args.next().map(parse_placement).transpose()?;
            Command::Load { file, placement }
        }
        other => Command::Unknown(other.to_owned()),
    };
    Ok(command)
}

/// Reports a paste outcome to the sender that requested it.
struct SenderSink {
    sender: Arc<dyn CommandSender>,
    messages: Arc<MessageStore>,
}

impl ResultSink for SenderSink {
    fn notify(&self, notice: &PasteNotice) {
        self.sender
            .send(&self.messages.snapshot().render_notice(notice));
    }
}

/// Executes commands against the running engine.
#[derive(Clone)]
pub struct Commands {
    pastes: PasteScheduler,
    config: Arc<ConfigStore>,
    messages: Arc<MessageStore>,
}

impl Commands {
    /// Bundle the services commands act on.
    pub const fn new(
        pastes: PasteScheduler,
        config: Arc<ConfigStore>,
        messages: Arc<MessageStore>,
    ) -> Self {
        Self {
            pastes,
            config,
            messages,
        }
    }

    fn reply(&self, sender: &dyn CommandSender, key: &str, replacements: &[(&str, &str)]) {
        sender.send(&self.messages.snapshot().render(key, replacements));
    }

    fn help(&self, sender: &dyn CommandSender) {
        for line in self.messages.snapshot().lines("commands.help") {
            sender.send(&line);
        }
    }

    /// Parse and run one line. Returns the handle of a submitted paste.
    pub fn execute(&self, sender: &Arc<dyn CommandSender>, line: &str) -> Option<PasteHandle> {
        match parse(line) {
            Ok(Command::Help) => self.help(sender.as_ref()),
            Ok(Command::List) => self.list(sender.as_ref()),
            Ok(Command::Reload) => self.reload(sender.as_ref()),
            Ok(Command::Load { file, placement }) => return self.load(sender, file, placement),
            Ok(Command::Unknown(name)) => {
                info!(command = %name, "Unknown command");
                self.reply(sender.as_ref(), "commands.unknown", &[]);
                self.help(sender.as_ref());
            }
            Err(CommandError::LoadUsage) => self.reply(sender.as_ref(), "load.usage", &[]),
            Err(CommandError::InvalidLocation { .. }) => {
                self.reply(sender.as_ref(), "load.invalid-location", &[]);
            }
        }
        None
    }

    fn list(&self, sender: &dyn CommandSender) {
        let names = self.pastes.locator().available();
        if names.is_empty() {
            self.reply(sender, "commands.list.empty", &[]);
            return;
        }
        self.reply(
            sender,
            "commands.list.header",
            &[("count", names.len().to_string().as_str())],
        );
        for name in &names {
            self.reply(sender, "commands.list.entry", &[("schematic", name.as_str())]);
        }
    }

    fn reload(&self, sender: &dyn CommandSender) {
        if !sender.has_permission(RELOAD_PERMISSION) {
            self.reply(sender, "commands.no-permission", &[]);
            return;
        }
        let result = self.config.reload().and_then(|config| {
            self.messages.reload()?;
            Ok(config)
        });
        match result {
            Ok(config) => {
                self.pastes.set_locator(SchematicLocator::new(
                    self.config.root(),
                    &config.schematics_folder,
                ));
                info!(folder = %config.schematics_folder, "Configuration reloaded");
                self.reply(sender, "commands.reload-success", &[]);
            }
            Err(err) => {
                warn!(error = %err, "Reload failed; keeping previous configuration");
                self.reply(sender, "errors.general", &[("error", err.to_string().as_str())]);
            }
        }
    }

    fn load(
        &self,
        sender: &Arc<dyn CommandSender>,
        file: String,
        placement: Option<Placement>,
    ) -> Option<PasteHandle> {
        if !sender.has_permission(LOAD_PERMISSION) {
            self.reply(sender.as_ref(), "commands.no-permission", &[]);
            return None;
        }
        let target = match placement {
            Some(Placement::At(pos)) => pos,
            Some(Placement::Here) | None => {
                let Some(pos) = sender.position() else {
                    self.reply(sender.as_ref(), "load.player-only", &[]);
                    return None;
                };
                pos
            }
        };

        let options = PasteOptions::from_config(&self.config.snapshot().performance);
        self.reply(sender.as_ref(), "load.started", &[("file", file.as_str())]);
        let sink = SenderSink {
            sender: Arc::clone(sender),
            messages: Arc::clone(&self.messages),
        };
        Some(self.pastes.load(
            PasteRequest::new(file, target, options),
            Some(Arc::new(sink)),
        ))
    }
}

impl std::fmt::Debug for Commands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commands")
            .field("pastes", &self.pastes)
            .finish_non_exhaustive()
    }
}

/// The process console: no position, every permission, plain-text output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console;

impl CommandSender for Console {
    fn send(&self, line: &str) {
        println!("{}", strip_color_codes(line));
    }

    fn position(&self) -> Option<BlockPos> {
        None
    }

    fn has_permission(&self, _permission: &str) -> bool {
        true
    }
}

/// Read commands from stdin until it closes.
pub async fn run_console(commands: &Commands) -> std::io::Result<()> {
    let sender: Arc<dyn CommandSender> = Arc::new(Console);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        drop(commands.execute(&sender, &line));
    }
    info!("Console input closed");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use autoschematic_core::messages::MessageCatalog;
    use autoschematic_core::schedule::TickScheduler;
    use autoschematic_core::tick_queue::TickQueue;
    use autoschematic_world::nbt;
    use autoschematic_world::schematic::Schematic;
    use autoschematic_world::source::FileClipboardSource;
    use autoschematic_world::world::BlockWorld;

    use super::*;

    #[derive(Default)]
    struct Player {
        position: Option<BlockPos>,
        denied: bool,
        lines: Mutex<Vec<String>>,
    }

    impl Player {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl CommandSender for Player {
        fn send(&self, line: &str) {
            self.lines.lock().unwrap().push(strip_color_codes(line));
        }

        fn position(&self) -> Option<BlockPos> {
            self.position
        }

        fn has_permission(&self, _permission: &str) -> bool {
            !self.denied
        }
    }

    struct Rig {
        dir: tempfile::TempDir,
        queue: Arc<TickQueue>,
        world: BlockWorld,
        commands: Commands,
    }

    fn rig() -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(ConfigStore::load_or_create(dir.path()).unwrap());
        let messages = Arc::new(MessageStore::load_or_create(dir.path()).unwrap());
        let schematic = Schematic::new(1, 1, 1, vec!["minecraft:gold_block".to_owned()], vec![0]).unwrap();
        std::fs::write(
            dir.path().join("schematics/statue.schem"),
            nbt::write("Schematic", &schematic.to_sponge_v2()).unwrap(),
        )
        .unwrap();
        let queue = Arc::new(TickQueue::new());
        let world = BlockWorld::new("world");
        let pastes = PasteScheduler::new(
            Arc::clone(&queue) as Arc<dyn TickScheduler>,
            Arc::new(FileClipboardSource::new()),
            Arc::new(world.clone()),
            SchematicLocator::new(dir.path(), &config.snapshot().schematics_folder),
        );
        Rig {
            dir,
            queue,
            world,
            commands: Commands::new(pastes, config, messages),
        }
    }

    fn player(position: Option<BlockPos>) -> (Arc<Player>, Arc<dyn CommandSender>) {
        let player = Arc::new(Player {
            position,
            ..Player::default()
        });
        let sender = Arc::clone(&player) as Arc<dyn CommandSender>;
        (player, sender)
    }

    #[test]
    fn parses_the_command_grammar() {
        assert_eq!(parse("").unwrap(), Command::Help);
        assert_eq!(parse("LIST").unwrap(), Command::List);
        assert_eq!(parse("load").unwrap_err(), CommandError::LoadUsage);
        assert_eq!(
            parse("load tower 1.9,-0.5,3").unwrap(),
            Command::Load {
                file: "tower".to_owned(),
                placement: Some(Placement::At(BlockPos::new(1, -1, 3))),
            }
        );
        assert_eq!(
            parse("load tower HERE").unwrap(),
            Command::Load {
                file: "tower".to_owned(),
                placement: Some(Placement::Here),
            }
        );
        assert!(matches!(
            parse("load tower 1,2"),
            Err(CommandError::InvalidLocation { .. })
        ));
        assert!(matches!(
            parse("load tower a,b,c"),
            Err(CommandError::InvalidLocation { .. })
        ));
        assert_eq!(parse("fly").unwrap(), Command::Unknown("fly".to_owned()));
    }

    #[test]
    fn load_at_coordinates_reports_back_to_the_sender() {
        let rig = rig();
        let (player, sender) = player(None);
        let handle = rig.commands.execute(&sender, "load statue 10,64,10");
        assert!(handle.is_some());
        rig.queue.advance(2);

        assert_eq!(
            rig.world.block(BlockPos::new(10, 64, 10)).as_deref(),
            Some("minecraft:gold_block")
        );
        let lines = player.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.last().unwrap().ends_with("Schematic pasted at 10, 64, 10."));
    }

    #[test]
    fn here_without_a_position_is_player_only() {
        let rig = rig();
        let (player, sender) = player(None);
        assert!(rig.commands.execute(&sender, "load statue here").is_none());
        assert!(rig.commands.execute(&sender, "load statue").is_none());
        let lines = player.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.contains("Only players")));
    }

    #[test]
    fn here_uses_the_sender_position() {
        let rig = rig();
        let (_player, sender) = player(Some(BlockPos::new(-4, 80, 2)));
        let mut handle = rig.commands.execute(&sender, "load statue here").unwrap();
        rig.queue.advance(2);
        assert!(handle.try_outcome().unwrap().is_success());
        assert!(rig.world.block(BlockPos::new(-4, 80, 2)).is_some());
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let rig = rig();
        let (player, sender) = player(None);
        drop(rig.commands.execute(&sender, "load ghost 0,0,0"));
        rig.queue.tick();
        assert!(player.lines().last().unwrap().ends_with("Schematic not found: ghost"));
    }

    #[test]
    fn permissions_are_checked() {
        let rig = rig();
        let player = Arc::new(Player {
            denied: true,
            ..Player::default()
        });
        let sender = Arc::clone(&player) as Arc<dyn CommandSender>;
        assert!(rig.commands.execute(&sender, "load statue 0,0,0").is_none());
        drop(rig.commands.execute(&sender, "reload"));
        let lines = player.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.contains("permission")));
    }

    #[test]
    fn list_shows_header_and_entries() {
        let rig = rig();
        let (player, sender) = player(None);
        drop(rig.commands.execute(&sender, "list"));
        let lines = player.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.first().unwrap().contains("(1)"));
        assert!(lines.last().unwrap().ends_with("- statue"));
    }

    #[test]
    fn reload_picks_up_a_new_folder_and_messages() {
        let rig = rig();
        let (player, sender) = player(None);
        std::fs::write(rig.dir.path().join("config.yml"), "schematics-folder: builds\n").unwrap();
        std::fs::write(
            rig.dir.path().join("messages.yml"),
            "prefix: ''\ncommands:\n  reload-success: 'done'\n  list:\n    empty: 'nothing'\n",
        )
        .unwrap();

        drop(rig.commands.execute(&sender, "reload"));
        drop(rig.commands.execute(&sender, "list"));
        assert_eq!(player.lines(), vec!["done".to_owned(), "nothing".to_owned()]);
        assert!(rig.dir.path().join("builds").is_dir());
    }

    #[test]
    fn unknown_command_prints_help() {
        let rig = rig();
        let (player, sender) = player(None);
        drop(rig.commands.execute(&sender, "fly"));
        let help = MessageCatalog::builtin().lines("commands.help").len();
        assert_eq!(player.lines().len(), help.saturating_add(1));
    }
}
