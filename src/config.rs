//! Application configuration: a flat `key = value` file merged over
//! built-in defaults, covering the `library.*` and `downloads.*`
//! namespaces the catalog-facing components read at startup.
//!
//! The file format intentionally mirrors the downloader's own config
//! loader rather than pulling in a TOML parser: one `key = value` pair per
//! line, `#` starts an inline comment, unknown keys are ignored so the
//! file stays forward-compatible with newer releases.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::importer::ColonReplacement;

/// Resolved configuration used to build the long-running parts of the
/// application (dispatcher fleet cap, scheduler tick interval, importer
/// naming and placement policy).
#[derive(Debug, Clone)]
pub struct Config {
    pub library: LibraryConfig,
    pub downloads: DownloadsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self { library: LibraryConfig::default(), downloads: DownloadsConfig::default() }
    }
}

/// Destination roots and naming templates, keyed by media kind.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    pub root_path: PathBuf,
    pub movie_path: Option<PathBuf>,
    pub tv_path: Option<PathBuf>,
    pub music_path: Option<PathBuf>,
    pub book_path: Option<PathBuf>,
    pub movie_folder_format: String,
    pub movie_file_format: String,
    pub tv_season_folder_format: String,
    pub tv_episode_file_format: String,
    pub create_movie_folder: bool,
    pub create_tv_season_folder: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            movie_path: None,
            tv_path: None,
            music_path: None,
            book_path: None,
            movie_folder_format: "{Movie Title} ({Release Year})".to_string(),
            movie_file_format: "{Movie Title} ({Release Year}) [{Quality}]".to_string(),
            tv_season_folder_format: "Season {season:00}".to_string(),
            tv_episode_file_format: "{Series Title} - S{season:00}E{episode:00} - {Episode Title}".to_string(),
            create_movie_folder: true,
            create_tv_season_folder: true,
        }
    }
}

impl LibraryConfig {
    /// Resolves the destination root for a media kind, falling back to
    /// `root_path` when no kind-specific path is configured.
    #[must_use]
    pub fn destination_root(&self, kind: crate::model::MediaKind) -> &Path {
        use crate::model::MediaKind;
        let configured = match kind {
            MediaKind::Movie => self.movie_path.as_deref(),
            MediaKind::TvSeries | MediaKind::TvSeason | MediaKind::TvEpisode => self.tv_path.as_deref(),
            MediaKind::MusicArtist | MediaKind::MusicAlbum | MediaKind::MusicTrack => self.music_path.as_deref(),
            MediaKind::Book => self.book_path.as_deref(),
        };
        configured.unwrap_or(&self.root_path)
    }
}

/// Import/placement policy: the `downloads.*` namespace.
#[derive(Debug, Clone)]
pub struct DownloadsConfig {
    pub use_hardlinks: bool,
    pub colon_replacement: ColonReplacement,
    pub extra_file_extensions: Vec<String>,
    pub import_extra_files: bool,
    pub minimum_free_space_mb: u64,
    pub skip_free_space_check: bool,
    pub max_concurrent_downloads: usize,
    pub set_permissions: bool,
    pub chmod_folder: Option<u32>,
    pub chmod_file: Option<u32>,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            use_hardlinks: true,
            colon_replacement: ColonReplacement::SpaceDash,
            extra_file_extensions: vec!["srt".to_string(), "sub".to_string(), "nfo".to_string()],
            import_extra_files: true,
            minimum_free_space_mb: 100,
            skip_free_space_check: false,
            max_concurrent_downloads: 8,
            set_permissions: false,
            chmod_folder: None,
            chmod_file: None,
        }
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/fetchbay/config`
/// 2. `$HOME/.config/fetchbay/config`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("fetchbay").join("config"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join("fetchbay").join("config"))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path, falling back to built-in defaults
/// when no file is present.
pub fn load_default() -> Result<Config> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    load_from_path(&path)
}

/// Loads and parses a config file at an explicit path.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw).with_context(|| format!("failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<Config> {
    let mut config = Config::default();

    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("invalid config syntax on line {}: expected key = value", line_index + 1);
        };
        let key = raw_key.trim();
        let value = raw_value.trim();

        apply_key(&mut config, key, value)
            .with_context(|| format!("invalid value for `{key}` on line {}", line_index + 1))?;
    }

    Ok(config)
}

fn apply_key(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "library.root_path" => config.library.root_path = PathBuf::from(parse_string_literal(value)?),
        "library.movie_path" => config.library.movie_path = Some(PathBuf::from(parse_string_literal(value)?)),
        "library.tv_path" => config.library.tv_path = Some(PathBuf::from(parse_string_literal(value)?)),
        "library.music_path" => config.library.music_path = Some(PathBuf::from(parse_string_literal(value)?)),
        "library.book_path" => config.library.book_path = Some(PathBuf::from(parse_string_literal(value)?)),
        "library.movie_folder_format" => config.library.movie_folder_format = parse_string_literal(value)?,
        "library.movie_file_format" => config.library.movie_file_format = parse_string_literal(value)?,
        "library.tv_season_folder_format" => config.library.tv_season_folder_format = parse_string_literal(value)?,
        "library.tv_episode_file_format" => config.library.tv_episode_file_format = parse_string_literal(value)?,
        "library.create_movie_folder" => config.library.create_movie_folder = parse_boolean(value)?,
        "library.create_tv_season_folder" => config.library.create_tv_season_folder = parse_boolean(value)?,
        "downloads.use_hardlinks" => config.downloads.use_hardlinks = parse_boolean(value)?,
        "downloads.colon_replacement" => config.downloads.colon_replacement = parse_colon_replacement(value)?,
        "downloads.extra_file_extensions" => config.downloads.extra_file_extensions = parse_string_list(value)?,
        "downloads.import_extra_files" => config.downloads.import_extra_files = parse_boolean(value)?,
        "downloads.minimum_free_space_mb" => config.downloads.minimum_free_space_mb = parse_integer_u64(value)?,
        "downloads.skip_free_space_check" => config.downloads.skip_free_space_check = parse_boolean(value)?,
        "downloads.max_concurrent_downloads" => {
            config.downloads.max_concurrent_downloads = parse_integer_u64(value)? as usize;
        }
        "downloads.set_permissions" => config.downloads.set_permissions = parse_boolean(value)?,
        "downloads.chmod_folder" => config.downloads.chmod_folder = Some(parse_octal_mode(value)?),
        "downloads.chmod_file" => config.downloads.chmod_file = Some(parse_octal_mode(value)?),
        _ => {} // unknown keys are ignored so older/newer configs keep loading
    }
    Ok(())
}

fn strip_inline_comment(line: &str) -> &str {
    match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    }
}

fn parse_string_literal(value: &str) -> Result<String> {
    let trimmed = value.trim();
    let unquoted = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(trimmed);
    Ok(unquoted.to_string())
}

fn parse_string_list(value: &str) -> Result<Vec<String>> {
    let literal = parse_string_literal(value)?;
    Ok(literal.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
}

fn parse_boolean(value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => bail!("expected `true` or `false`, got `{other}`"),
    }
}

fn parse_integer_u64(value: &str) -> Result<u64> {
    value.parse::<u64>().with_context(|| format!("expected an integer, got `{value}`"))
}

/// Parses a Unix permission mode given as octal digits, with or without a
/// leading `0` (e.g. `755` or `0755`).
fn parse_octal_mode(value: &str) -> Result<u32> {
    let literal = parse_string_literal(value)?;
    u32::from_str_radix(&literal, 8).with_context(|| format!("expected an octal mode like `0755`, got `{literal}`"))
}

fn parse_colon_replacement(value: &str) -> Result<ColonReplacement> {
    match parse_string_literal(value)?.as_str() {
        "delete" => Ok(ColonReplacement::Delete),
        "dash" => Ok(ColonReplacement::Dash),
        "space" => Ok(ColonReplacement::Space),
        "spacedash" => Ok(ColonReplacement::SpaceDash),
        other => bail!("expected one of delete|dash|space|spacedash, got `{other}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_no_file_is_present() {
        let config = Config::default();
        assert_eq!(config.downloads.max_concurrent_downloads, 8);
        assert!(config.downloads.use_hardlinks);
    }

    #[test]
    fn parses_known_keys_and_ignores_unknown_ones() {
        let raw = "library.movie_path = \"/mnt/movies\"  # primary library\n\
                    downloads.use_hardlinks = false\n\
                    downloads.colon_replacement = dash\n\
                    downloads.extra_file_extensions = srt, nfo\n\
                    some.future.key = whatever\n";
        let config = parse_config_str(raw).unwrap();
        assert_eq!(config.library.movie_path, Some(PathBuf::from("/mnt/movies")));
        assert!(!config.downloads.use_hardlinks);
        assert_eq!(config.downloads.colon_replacement, ColonReplacement::Dash);
        assert_eq!(config.downloads.extra_file_extensions, vec!["srt", "nfo"]);
    }

    #[test]
    fn parses_permission_and_extras_keys() {
        let raw = "downloads.import_extra_files = false\n\
                    downloads.set_permissions = true\n\
                    downloads.chmod_folder = 0755\n\
                    downloads.chmod_file = 644\n";
        let config = parse_config_str(raw).unwrap();
        assert!(!config.downloads.import_extra_files);
        assert!(config.downloads.set_permissions);
        assert_eq!(config.downloads.chmod_folder, Some(0o755));
        assert_eq!(config.downloads.chmod_file, Some(0o644));
    }

    #[test]
    fn rejects_a_malformed_line() {
        let error = parse_config_str("not a key value pair").unwrap_err();
        assert!(error.to_string().contains("line 1"));
    }
}
