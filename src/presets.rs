//! Presets and their compilation into downloader arguments
//!
//! A preset is compiled into the ordered flag/value list that sits between the
//! global arguments and the target URL on the downloader command line.

use once_cell::sync::Lazy;

use crate::data_structures::{Backend, BackendSupport, Preset};
use crate::error::{AppError, Result};

/// Flag selecting the format expression
pub const FORMAT_FLAG: &str = "-f";

/// Flag selecting the container formats are merged into
pub const MERGE_OUTPUT_FLAG: &str = "--merge-output-format";

/// Built-in presets, created once and never modified
pub static PREDEFINED_PRESETS: Lazy<Vec<Preset>> = Lazy::new(|| {
    vec![
        Preset::predefined("Auto", None, None, BackendSupport::ALL, &[]),
        Preset::predefined(
            "Best video + audio",
            Some("bestvideo+bestaudio"),
            None,
            BackendSupport::ALL,
            &[],
        ),
        Preset::predefined(
            "MP4",
            Some("bestvideo[ext=mp4]+bestaudio[ext=m4a]"),
            Some("mp4"),
            BackendSupport::ALL,
            &[],
        ),
        Preset::predefined("WebM", Some("248+251"), Some("webm"), BackendSupport::ALL, &[]),
        Preset::predefined("WebM (container only)", None, Some("webm"), BackendSupport::ALL, &[]),
        Preset::predefined("Audio only", Some("bestaudio"), None, BackendSupport::ALL, &[]),
        Preset::predefined(
            "MP3",
            Some("bestaudio"),
            None,
            BackendSupport::ALL,
            &["-x", "--audio-format", "mp3"],
        ),
        Preset::predefined(
            "1080p (sorted)",
            None,
            None,
            BackendSupport::YT_DLP,
            &["-S", "res:1080"],
        ),
    ]
});

impl Preset {
    /// Create a user preset
    pub fn new(
        name: Option<&str>,
        format_arg: Option<&str>,
        container_arg: Option<&str>,
    ) -> Self {
        Self {
            name: name.map(str::to_string),
            format_arg: format_arg.map(str::to_string),
            container_arg: container_arg.map(str::to_string),
            ..Self::default()
        }
    }

    fn predefined(
        name: &str,
        format_arg: Option<&str>,
        container_arg: Option<&str>,
        supported_backends: BackendSupport,
        extra_args: &[&str],
    ) -> Self {
        Self {
            supported_backends,
            is_predefined: true,
            extra_args: extra_args.iter().map(|a| a.to_string()).collect(),
            ..Self::new(Some(name), format_arg, container_arg)
        }
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_backends(mut self, supported_backends: BackendSupport) -> Self {
        self.supported_backends = supported_backends;
        self
    }

    /// Display label, "Auto" for unnamed presets
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Auto")
    }

    /// True when the preset contributes nothing to the command line
    pub fn is_auto(&self) -> bool {
        self.format_arg.is_none() && self.container_arg.is_none() && self.extra_args.is_empty()
    }

    pub fn supports(&self, backend: Backend) -> bool {
        self.supported_backends.contains(backend)
    }

    /// Compile the preset into downloader arguments.
    ///
    /// A container without a format is passed as the format selector itself,
    /// so `container_arg = "webm"` alone yields `["-f", "webm"]`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(4 + self.extra_args.len());
        let mut next_flag = FORMAT_FLAG;

        if let Some(format) = &self.format_arg {
            args.push(FORMAT_FLAG.to_string());
            args.push(format.clone());
            next_flag = MERGE_OUTPUT_FLAG;
        }
        if let Some(container) = &self.container_arg {
            args.push(next_flag.to_string());
            args.push(container.clone());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Predefined presets plus the user's own, with edit rules applied
#[derive(Clone, Debug, Default)]
pub struct PresetStore {
    user: Vec<Preset>,
}

impl PresetStore {
    pub fn new(user_presets: Vec<Preset>) -> Self {
        let user = user_presets
            .into_iter()
            .map(|mut p| {
                p.is_predefined = false;
                p
            })
            .collect();
        Self { user }
    }

    /// Every preset, predefined first
    pub fn all(&self) -> impl Iterator<Item = &Preset> {
        PREDEFINED_PRESETS.iter().chain(self.user.iter())
    }

    pub fn user_presets(&self) -> &[Preset] {
        &self.user
    }

    pub fn for_backend(&self, backend: Backend) -> Vec<&Preset> {
        self.all().filter(|p| p.supports(backend)).collect()
    }

    /// Case-insensitive lookup by display name
    pub fn find(&self, name: &str) -> Option<&Preset> {
        self.all().find(|p| p.display_name().eq_ignore_ascii_case(name))
    }

    pub fn add(&mut self, mut preset: Preset) -> Result<()> {
        let name = preset.display_name().to_string();
        if self.find(&name).is_some() {
            return Err(AppError::DuplicatePreset(name));
        }
        preset.is_predefined = false;
        log::info!("Adding preset '{}'", name);
        self.user.push(preset);
        Ok(())
    }

    /// Replace the user preset called `name`, keeping its position
    pub fn replace(&mut self, name: &str, mut preset: Preset) -> Result<()> {
        self.ensure_editable(name)?;
        let new_name = preset.display_name().to_string();
        if !new_name.eq_ignore_ascii_case(name) && self.find(&new_name).is_some() {
            return Err(AppError::DuplicatePreset(new_name));
        }
        let slot = self
            .user
            .iter_mut()
            .find(|p| p.display_name().eq_ignore_ascii_case(name))
            .ok_or_else(|| AppError::PresetNotFound(name.to_string()))?;
        preset.is_predefined = false;
        *slot = preset;
        log::info!("Updated preset '{}'", new_name);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Preset> {
        self.ensure_editable(name)?;
        let index = self
            .user
            .iter()
            .position(|p| p.display_name().eq_ignore_ascii_case(name))
            .ok_or_else(|| AppError::PresetNotFound(name.to_string()))?;
        log::info!("Removing preset '{}'", name);
        Ok(self.user.remove(index))
    }

    fn ensure_editable(&self, name: &str) -> Result<()> {
        match PREDEFINED_PRESETS
            .iter()
            .find(|p| p.display_name().eq_ignore_ascii_case(name))
        {
            Some(p) => Err(AppError::PredefinedPreset(p.display_name().to_string())),
            None => Ok(()),
        }
    }

    pub fn into_user_presets(self) -> Vec<Preset> {
        self.user
    }
}
