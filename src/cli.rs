//! Command-line front-end
//!
//! Every subcommand loads the settings, performs its action and saves the
//! settings back when it changed them.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use crate::data_structures::{Backend, BackendSupport, DownloadStatus, Preset};
use crate::downloader::{build_arguments, Downloader};
use crate::error::{AppError, Result};
use crate::helper_functions::{Utils, Validation};
use crate::presets::PresetStore;
use crate::progress::ProgressSnapshot;
use crate::settings::Settings;
use crate::tool_manager::ToolManager;

/// Number of output lines shown when a download fails
const FAILURE_TAIL_LINES: usize = 20;

/// Download videos with youtube-dl or yt-dlp using reusable presets.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    /// Use this settings file instead of the default location.
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Download(Download),
    #[command(subcommand)]
    Presets(PresetsCommand),
    #[command(subcommand)]
    Tool(ToolCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
}

/// Settings loaded for one invocation, plus where they came from
pub struct Context {
    pub settings: Settings,
    pub path: PathBuf,
}

impl Context {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Settings::get_path()?,
        };
        Ok(Self {
            settings: Settings::load_from(&path),
            path,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.settings.save_to(&self.path)
    }

    fn preset_store(&self) -> PresetStore {
        PresetStore::new(self.settings.custom_presets.clone())
    }

    fn store_presets(&mut self, store: PresetStore) -> Result<()> {
        self.settings.custom_presets = store.into_user_presets();
        self.save()
    }

    fn executable(&self, backend: Backend) -> Result<PathBuf> {
        ToolManager::locate(backend, self.settings.executable_override(backend))
    }
}

impl Args {
    pub fn execute(&self) -> Result<()> {
        let mut ctx = Context::load(self.settings.as_deref())?;
        match &self.command {
            Commands::Download(args) => args.execute(&mut ctx),
            Commands::Presets(cmd) => cmd.execute(&mut ctx),
            Commands::Tool(cmd) => cmd.execute(&ctx),
            Commands::Settings(cmd) => cmd.execute(&mut ctx),
        }
    }
}

/// Download a link with the selected preset.
#[derive(Debug, Clone, ClapArgs)]
pub struct Download {
    /// Link (or yt-dlp search query) to download.
    pub url: String,

    /// Preset name, defaults to the saved selection or "Auto".
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Downloader to run (youtube-dl or yt-dlp).
    #[arg(short, long)]
    pub backend: Option<Backend>,

    /// Directory the file is written to.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output file name template.
    #[arg(long)]
    pub template: Option<String>,

    /// Do not write metadata into the file.
    #[arg(long)]
    pub no_metadata: bool,

    /// Embed the thumbnail as cover art.
    #[arg(long)]
    pub thumbnail: bool,

    /// Download and embed subtitles.
    #[arg(long)]
    pub subtitles: bool,

    /// Download the whole playlist the link belongs to.
    #[arg(long)]
    pub playlist: bool,

    /// Print the command line instead of running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Remember the preset and backend as defaults.
    #[arg(long)]
    pub save: bool,

    /// Extra arguments passed to the downloader before the preset.
    #[arg(last = true)]
    pub extra: Vec<String>,
}

impl Download {
    pub fn execute(&self, ctx: &mut Context) -> Result<()> {
        let url = self.url.trim();
        if !Validation::is_valid_url(url) {
            return Err(AppError::InvalidUrl(self.url.clone()));
        }

        let backend = self.backend.unwrap_or(ctx.settings.backend);
        let preset_name = self
            .preset
            .clone()
            .or_else(|| ctx.settings.selected_preset.clone())
            .unwrap_or_else(|| "Auto".to_string());
        let store = ctx.preset_store();
        let preset = store
            .find(&preset_name)
            .cloned()
            .ok_or_else(|| AppError::PresetNotFound(preset_name.clone()))?;
        if !preset.supports(backend) {
            return Err(AppError::Unsupported(format!("preset '{}'", preset.display_name())));
        }

        let mut options = ctx.settings.download_options();
        if let Some(dir) = &self.output {
            options.output_dir = Some(dir.clone());
        }
        if let Some(dir) = &options.output_dir {
            if !Validation::is_valid_folder(&dir.to_string_lossy()) {
                warn!("Output directory {} does not exist yet", dir.display());
            }
        }
        if let Some(template) = &self.template {
            options.output_template = template.clone();
        }
        options.add_metadata &= !self.no_metadata;
        options.embed_thumbnail |= self.thumbnail;
        options.subtitles |= self.subtitles;
        options.playlist |= self.playlist;
        options.global_args.extend(self.extra.iter().cloned());

        if self.save {
            ctx.settings.backend = backend;
            ctx.settings.selected_preset = Some(preset.display_name().to_string());
            ctx.save()?;
        }

        if self.dry_run {
            let program = match ctx.executable(backend) {
                Ok(path) => path.display().to_string(),
                Err(_) => backend.executable_name().to_string(),
            };
            println!(
                "{}",
                Utils::format_command_line(&program, &build_arguments(&options, &preset, url))
            );
            return Ok(());
        }

        let downloader = Downloader::new(ctx.executable(backend)?);
        let handle = downloader.download(&options, &preset, url)?;

        let abort = handle.abort_handle();
        if let Err(e) = ctrlc::set_handler(move || {
            if let Err(e) = abort.abort() {
                warn!("Failed to abort download: {}", e);
            }
        }) {
            warn!("Ctrl-C handler not installed: {}", e);
        }

        let bar = progress_bar();
        let render = {
            let bar = bar.clone();
            let updates = handle.subscribe();
            thread::spawn(move || render_progress(&bar, updates))
        };

        let outcome = handle.wait()?;
        let _ = render.join();

        match &outcome.status {
            DownloadStatus::Finished => {
                bar.finish_with_message(Utils::format_snapshot(&outcome.progress));
                println!("Download finished");
                Ok(())
            }
            DownloadStatus::Aborted => {
                bar.abandon_with_message("aborted");
                println!("Download aborted");
                Ok(())
            }
            status => {
                bar.abandon_with_message(status.to_string());
                let skip = outcome.output.len().saturating_sub(FAILURE_TAIL_LINES);
                for line in &outcome.output[skip..] {
                    eprintln!("{}", line);
                }
                Err(AppError::ToolFailed {
                    tool: downloader.executable().display().to_string(),
                    code: outcome.exit_code,
                    stderr: status.to_string(),
                })
            }
        }
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(1000);
    let style = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message("waiting for downloader...");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn render_progress(bar: &ProgressBar, updates: Receiver<ProgressSnapshot>) {
    for snapshot in updates {
        if let Some(p) = snapshot.percentage {
            bar.set_position((p.clamp(0.0, 1.0) * 1000.0) as u64);
        }
        bar.set_message(Utils::format_snapshot(&snapshot));
    }
}

/// Manage presets.
#[derive(Debug, Clone, Subcommand)]
pub enum PresetsCommand {
    /// List presets, optionally only those a backend supports.
    List {
        #[arg(short, long)]
        backend: Option<Backend>,
    },
    /// Print one preset as JSON.
    Show { name: String },
    /// Create a user preset.
    Add(PresetFields),
    /// Replace a user preset.
    Edit {
        /// Current name of the preset.
        #[arg(value_name = "NAME")]
        current: String,
        #[command(flatten)]
        fields: PresetFields,
    },
    /// Delete a user preset.
    Remove { name: String },
}

#[derive(Debug, Clone, ClapArgs)]
pub struct PresetFields {
    /// Display name.
    #[arg(long)]
    pub name: String,

    /// Format selector, e.g. 248+251.
    #[arg(short, long)]
    pub format: Option<String>,

    /// Container to merge into, e.g. webm.
    #[arg(short, long)]
    pub container: Option<String>,

    /// Backends the preset works with (repeatable), all by default.
    #[arg(short, long)]
    pub backend: Vec<Backend>,

    /// Arguments appended after format and container.
    #[arg(last = true)]
    pub extra: Vec<String>,
}

impl PresetFields {
    fn to_preset(&self) -> Preset {
        let backends = if self.backend.is_empty() {
            BackendSupport::ALL
        } else {
            BackendSupport::from(self.backend.clone())
        };
        Preset::new(Some(self.name.as_str()), self.format.as_deref(), self.container.as_deref())
            .with_backends(backends)
            .with_extra_args(self.extra.iter().cloned())
    }
}

/// Preset names match without regard to case, like `PresetStore::find`
fn is_selected(settings: &Settings, name: &str) -> bool {
    settings
        .selected_preset
        .as_deref()
        .is_some_and(|selected| selected.eq_ignore_ascii_case(name))
}

impl PresetsCommand {
    pub fn execute(&self, ctx: &mut Context) -> Result<()> {
        let mut store = ctx.preset_store();
        match self {
            PresetsCommand::List { backend } => {
                let presets = match backend {
                    Some(backend) => store.for_backend(*backend),
                    None => store.all().collect(),
                };
                for preset in presets {
                    let marker = if preset.is_predefined { ' ' } else { '*' };
                    println!(
                        "{} {:<24} [{}] {}",
                        marker,
                        Utils::truncate_string(preset.display_name(), 24),
                        preset.supported_backends,
                        preset.to_args().join(" ")
                    );
                }
            }
            PresetsCommand::Show { name } => {
                let preset = store
                    .find(name)
                    .ok_or_else(|| AppError::PresetNotFound(name.clone()))?;
                println!("{}", serde_json::to_string_pretty(preset)?);
            }
            PresetsCommand::Add(fields) => {
                store.add(fields.to_preset())?;
                ctx.store_presets(store)?;
                println!("Added preset '{}'", fields.name);
            }
            PresetsCommand::Edit { current, fields } => {
                store.replace(current, fields.to_preset())?;
                if is_selected(&ctx.settings, current) {
                    ctx.settings.selected_preset = Some(fields.name.clone());
                }
                ctx.store_presets(store)?;
                println!("Updated preset '{}'", fields.name);
            }
            PresetsCommand::Remove { name } => {
                let removed = store.remove(name)?;
                if is_selected(&ctx.settings, removed.display_name()) {
                    ctx.settings.selected_preset = None;
                }
                ctx.store_presets(store)?;
                println!("Removed preset '{}'", removed.display_name());
            }
        }
        Ok(())
    }
}

/// Inspect, install or update the downloader executable.
#[derive(Debug, Clone, Subcommand)]
pub enum ToolCommand {
    /// Print the installed version.
    Version {
        #[arg(short, long)]
        backend: Option<Backend>,
    },
    /// Compare the installed version with the latest release.
    Check {
        #[arg(short, long)]
        backend: Option<Backend>,
    },
    /// Let yt-dlp update itself.
    Update,
    /// Download the latest yt-dlp release.
    Install {
        /// Target directory, defaults to the application tools directory.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

impl ToolCommand {
    pub fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            ToolCommand::Version { backend } => {
                let backend = backend.unwrap_or(ctx.settings.backend);
                let executable = ctx.executable(backend)?;
                println!("{} {} ({})", backend, ToolManager::version(&executable)?, executable.display());
            }
            ToolCommand::Check { backend } => {
                let backend = backend.unwrap_or(ctx.settings.backend);
                let current = ToolManager::version(&ctx.executable(backend)?)?;
                let latest = ToolManager::latest_release(backend)?;
                if ToolManager::is_outdated(&current, &latest) {
                    println!("{} {} is outdated, latest is {}", backend, current, latest);
                } else {
                    println!("{} {} is up to date", backend, current);
                }
            }
            ToolCommand::Update => {
                let executable = ctx.executable(Backend::YtDlp)?;
                println!("{}", ToolManager::self_update(Backend::YtDlp, &executable)?);
            }
            ToolCommand::Install { dir } => {
                let dir = match dir {
                    Some(dir) => dir.clone(),
                    None => ToolManager::tools_dir()?,
                };
                let path = ToolManager::install_latest(Backend::YtDlp, &dir)?;
                info!("yt-dlp installed to {}", path.display());
                println!("Installed {}", path.display());
            }
        }
        Ok(())
    }
}

/// Show or change saved settings.
#[derive(Debug, Clone, Subcommand)]
pub enum SettingsCommand {
    /// Print the settings as JSON.
    Show,
    /// Print the settings file location.
    Path,
    /// Change one or more settings.
    Set(SettingsUpdate),
}

#[derive(Debug, Clone, ClapArgs)]
pub struct SettingsUpdate {
    #[arg(long)]
    pub backend: Option<Backend>,
    #[arg(long)]
    pub preset: Option<String>,
    #[arg(long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub template: Option<String>,
    #[arg(long)]
    pub metadata: Option<bool>,
    #[arg(long)]
    pub thumbnail: Option<bool>,
    #[arg(long)]
    pub subtitles: Option<bool>,
    #[arg(long)]
    pub playlist: Option<bool>,
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,
    #[arg(long)]
    pub yt_dlp_path: Option<PathBuf>,
    #[arg(long)]
    pub youtube_dl_path: Option<PathBuf>,
    /// Replace the global downloader arguments.
    #[arg(last = true)]
    pub global_args: Vec<String>,
}

impl SettingsUpdate {
    /// Apply the given fields, rejecting unknown preset names
    pub fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(name) = &self.preset {
            let store = PresetStore::new(settings.custom_presets.clone());
            let preset = store
                .find(name)
                .ok_or_else(|| AppError::PresetNotFound(name.clone()))?;
            settings.selected_preset = Some(preset.display_name().to_string());
        }
        if let Some(backend) = self.backend {
            settings.backend = backend;
        }
        if let Some(output) = &self.output {
            settings.output_dir = Some(output.clone());
        }
        if let Some(template) = &self.template {
            settings.output_template = template.clone();
        }
        if let Some(v) = self.metadata {
            settings.add_metadata = v;
        }
        if let Some(v) = self.thumbnail {
            settings.embed_thumbnail = v;
        }
        if let Some(v) = self.subtitles {
            settings.subtitles = v;
        }
        if let Some(v) = self.playlist {
            settings.playlist = v;
        }
        if let Some(path) = &self.ffmpeg {
            settings.ffmpeg_location = Some(path.clone());
        }
        if let Some(path) = &self.yt_dlp_path {
            settings.yt_dlp_path = Some(path.clone());
        }
        if let Some(path) = &self.youtube_dl_path {
            settings.youtube_dl_path = Some(path.clone());
        }
        if !self.global_args.is_empty() {
            settings.global_args = self.global_args.clone();
        }
        Ok(())
    }
}

impl SettingsCommand {
    pub fn execute(&self, ctx: &mut Context) -> Result<()> {
        match self {
            SettingsCommand::Show => println!("{}", serde_json::to_string_pretty(&ctx.settings)?),
            SettingsCommand::Path => println!("{}", ctx.path.display()),
            SettingsCommand::Set(update) => {
                update.apply(&mut ctx.settings)?;
                ctx.save()?;
                println!("Settings saved to {}", ctx.path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn parses_presets_edit_with_new_name() {
        let args = Args::try_parse_from(["ytdl-frontend", "presets", "edit", "mine", "--name", "Other"]).unwrap();
        let Commands::Presets(PresetsCommand::Edit { current, fields }) = args.command else {
            panic!("expected presets edit");
        };
        assert_eq!(current, "mine");
        assert_eq!(fields.name, "Other");
    }

    #[test]
    fn parses_download_with_trailing_args() {
        let args = Args::try_parse_from([
            "ytdl-frontend",
            "download",
            "https://youtu.be/x",
            "--preset",
            "WebM",
            "--backend",
            "youtube-dl",
            "--dry-run",
            "--",
            "--limit-rate",
            "1M",
        ])
        .unwrap();
        match args.command {
            Commands::Download(d) => {
                assert_eq!(d.preset.as_deref(), Some("WebM"));
                assert_eq!(d.backend, Some(Backend::YoutubeDl));
                assert!(d.dry_run);
                assert_eq!(d.extra, vec!["--limit-rate".to_string(), "1M".to_string()]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn preset_fields_build_user_preset() {
        let args = Args::try_parse_from([
            "ytdl-frontend",
            "presets",
            "add",
            "--name",
            "Small",
            "-f",
            "18",
            "-b",
            "yt-dlp",
            "--",
            "--no-part",
        ])
        .unwrap();
        let Commands::Presets(PresetsCommand::Add(fields)) = args.command else {
            panic!("expected presets add");
        };
        let preset = fields.to_preset();
        assert_eq!(preset.supported_backends, BackendSupport::YT_DLP);
        assert_eq!(preset.to_args(), vec!["-f", "18", "--no-part"]);
        assert!(!preset.is_predefined);
    }

    fn fields(name: &str) -> PresetFields {
        PresetFields {
            name: name.to_string(),
            format: Some("18".into()),
            container: None,
            backend: Vec::new(),
            extra: Vec::new(),
        }
    }

    #[test]
    fn selection_follows_preset_edits_in_any_case() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context {
            settings: Settings::default(),
            path: dir.path().join("settings.json"),
        };
        PresetsCommand::Add(fields("Mine")).execute(&mut ctx).unwrap();
        ctx.settings.selected_preset = Some("Mine".into());

        PresetsCommand::Edit {
            current: "mine".into(),
            fields: fields("Other"),
        }
        .execute(&mut ctx)
        .unwrap();
        assert_eq!(ctx.settings.selected_preset.as_deref(), Some("Other"));
        assert!(ctx.preset_store().find("Other").is_some());

        ctx.settings.selected_preset = Some("other".into());
        PresetsCommand::Remove { name: "OTHER".into() }.execute(&mut ctx).unwrap();
        assert_eq!(ctx.settings.selected_preset, None);

        let saved = Settings::load_from(&ctx.path);
        assert!(saved.custom_presets.is_empty());
        assert_eq!(saved.selected_preset, None);
    }

    #[test]
    fn settings_update_rejects_unknown_preset() {
        let mut settings = Settings::default();
        let update = SettingsUpdate {
            backend: Some(Backend::YoutubeDl),
            preset: Some("nope".into()),
            output: None,
            template: None,
            metadata: Some(false),
            thumbnail: None,
            subtitles: None,
            playlist: None,
            ffmpeg: None,
            yt_dlp_path: None,
            youtube_dl_path: None,
            global_args: Vec::new(),
        };
        assert!(matches!(update.apply(&mut settings), Err(AppError::PresetNotFound(_))));

        let update = SettingsUpdate {
            preset: Some("mp4".into()),
            ..update
        };
        update.apply(&mut settings).unwrap();
        assert_eq!(settings.selected_preset.as_deref(), Some("MP4"));
        assert_eq!(settings.backend, Backend::YoutubeDl);
        assert!(!settings.add_metadata);
    }
}
