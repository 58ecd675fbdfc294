//! Desktop implementation of `WallpaperPersister`: renders the crop to a file
//! in the cache directory and hands it to the desktop environment.

use chrono::Utc;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::crop::CropRectangle;
use crate::destination::Destination;
use crate::geometry::Dimensions;
use crate::history::{CommitHistory, CommitRecord};
use crate::services::{PersistError, WallpaperPersister};

pub fn get_desktop_environment() -> String {
    if let Ok(desktop_session) = std::env::var("DESKTOP_SESSION") {
        let session = desktop_session.to_lowercase();
        if ["gnome", "unity", "cinnamon", "mate", "xfce4", "lxde", "fluxbox",
            "blackbox", "openbox", "icewm", "jwm", "afterstep", "trinity", "kde", "plasma"].contains(&session.as_str()) {
            return if session == "plasma" { "kde".to_string() } else { session };
        }

        if session.contains("xfce") || session.starts_with("xubuntu") {
            return "xfce4".to_string();
        } else if session.starts_with("ubuntustudio") || session.starts_with("kubuntu") {
            return "kde".to_string();
        } else if session.starts_with("ubuntu") {
            return "gnome".to_string();
        } else if session.starts_with("lubuntu") {
            return "lxde".to_string();
        }
    }

    if std::env::var("KDE_FULL_SESSION").unwrap_or_default() == "true" {
        return "kde".to_string();
    }

    if std::env::var("GNOME_DESKTOP_SESSION_ID").is_ok() {
        return "gnome".to_string();
    }

    "unknown".to_string()
}

/// Paints wallpapers cut from one source image.
pub struct DesktopPersister {
    source: PathBuf,
    cache_dir: PathBuf,
    history: Option<Arc<CommitHistory>>,
}

impl DesktopPersister {
    pub fn new(source: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            cache_dir: cache_dir.into(),
            history: None,
        }
    }

    /// Records every successful destination in `history`.
    pub fn with_history(mut self, history: Arc<CommitHistory>) -> Self {
        self.history = Some(history);
        self
    }
}

impl WallpaperPersister for DesktopPersister {
    fn apply_crop(
        &self,
        destination: Destination,
        crop: CropRectangle,
        zoom: f64,
    ) -> impl Future<Output = Result<(), PersistError>> + Send {
        let source = self.source.clone();
        let cache_dir = self.cache_dir.clone();
        let history = self.history.clone();

        async move {
            tokio::task::spawn_blocking(move || {
                let rendered = render_crop(&source, &cache_dir, destination, crop, zoom)?;
                match destination {
                    Destination::Home => set_home_wallpaper(&rendered)?,
                    Destination::Lock => set_lock_wallpaper(&rendered)?,
                    Destination::Both => return Err(PersistError::new("BOTH must be expanded before persisting")),
                }

                if let Some(history) = history {
                    let record = CommitRecord::now(destination, crop, zoom, Some(source));
                    if let Err(e) = history.append(record) {
                        log::warn!("failed to record commit for {}: {}", destination, e);
                    }
                }
                Ok(())
            })
            .await
            .map_err(|e| PersistError::new(format!("wallpaper task failed: {}", e)))?
        }
    }
}

/// Cuts `crop` out of `source`, scales it by `zoom`, and writes a JPEG into `cache_dir`.
pub fn render_crop(
    source: &Path,
    cache_dir: &Path,
    destination: Destination,
    crop: CropRectangle,
    zoom: f64,
) -> Result<PathBuf, PersistError> {
    let img = image::open(source)
        .map_err(|e| PersistError::new(format!("failed to decode {}: {}", source.display(), e)))?;
    let (width, height) = img.dimensions();
    let bounds = Dimensions::new(width as i32, height as i32);

    let rect = crop.clamped_to(bounds);
    if rect.width() <= 0 || rect.height() <= 0 {
        return Err(PersistError::new(format!("crop {} lies outside the {} image", crop, bounds)));
    }
    if rect != crop {
        log::debug!("crop {} clamped to {}", crop, rect);
    }

    let cropped = img.crop_imm(rect.left as u32, rect.top as u32, rect.width() as u32, rect.height() as u32);
    let target_width = ((rect.width() as f64 * zoom).round() as u32).max(1);
    let target_height = ((rect.height() as f64 * zoom).round() as u32).max(1);
    let scaled = cropped.resize_exact(target_width, target_height, FilterType::Lanczos3);

    std::fs::create_dir_all(cache_dir)
        .map_err(|e| PersistError::new(format!("failed to create {}: {}", cache_dir.display(), e)))?;
    let file_name = format!("{}-{}.jpg", destination.as_str(), Utc::now().format("%Y%m%d%H%M%S%3f"));
    let output = cache_dir.join(file_name);
    scaled
        .to_rgb8()
        .save_with_format(&output, ImageFormat::Jpeg)
        .map_err(|e| PersistError::new(format!("failed to write {}: {}", output.display(), e)))?;

    log::debug!("rendered {} ({}x{}) for {}", output.display(), target_width, target_height, destination);
    Ok(output)
}

fn set_home_wallpaper(file_path: &Path) -> Result<(), PersistError> {
    let file_loc = file_path.to_string_lossy().into_owned();

    match wallpaper::set_from_path(&file_loc) {
        Ok(()) => {
            log::info!("home wallpaper set to: {}", file_loc);
            Ok(())
        }
        Err(e) => {
            log::warn!("wallpaper backend failed ({}), trying desktop commands", e);
            set_home_wallpaper_fallback(file_path)
        }
    }
}

fn set_home_wallpaper_fallback(file_path: &Path) -> Result<(), PersistError> {
    let file_loc = file_path.to_string_lossy().into_owned();
    let desktop_env = get_desktop_environment();

    let ok = match desktop_env.as_str() {
        "gnome" | "unity" | "cinnamon" => {
            let uri = format!("file://{}", file_loc);
            run("gsettings", &["set", "org.gnome.desktop.background", "picture-uri", uri.as_str()])?
        }
        "mate" => run("gsettings", &["set", "org.mate.background", "picture-filename", file_loc.as_str()])?,
        "xfce4" => {
            let list_output = Command::new("xfconf-query")
                .args(["-c", "xfce4-desktop", "-l"])
                .output()
                .map_err(|e| PersistError::new(format!("xfconf-query: {}", e)))?;

            if list_output.status.success() {
                let paths = String::from_utf8_lossy(&list_output.stdout);
                for path in paths.lines().filter(|line| line.contains("workspace0/last-image")) {
                    run("xfconf-query", &["-c", "xfce4-desktop", "-p", path.trim(), "-s", file_loc.as_str()])?;
                }
            }
            run("xfconf-query", &["-c", "xfce4-desktop", "-p", "/backdrop/screen0/monitor0/image-path", "-s", file_loc.as_str()])?;
            run("xfdesktop", &["--reload"])?
        }
        "lxde" => run("pcmanfm", &["--set-wallpaper", file_loc.as_str(), "--wallpaper-mode=crop"])?,
        "fluxbox" | "jwm" | "openbox" | "afterstep" => run("fbsetbg", &[file_loc.as_str()])?,
        "icewm" => run("icewmbg", &[file_loc.as_str()])?,
        "blackbox" => run("bsetbg", &["-full", file_loc.as_str()])?,
        _ => {
            return Err(PersistError::new(format!(
                "desktop environment '{}' not supported",
                desktop_env
            )))
        }
    };

    if ok {
        Ok(())
    } else {
        Err(PersistError::new(format!("{} rejected the wallpaper", desktop_env)))
    }
}

fn set_lock_wallpaper(file_path: &Path) -> Result<(), PersistError> {
    let file_loc = file_path.to_string_lossy().into_owned();
    let desktop_env = get_desktop_environment();

    let ok = match desktop_env.as_str() {
        "gnome" | "unity" | "cinnamon" => {
            let uri = format!("file://{}", file_loc);
            run("gsettings", &["set", "org.gnome.desktop.screensaver", "picture-uri", uri.as_str()])?
        }
        "mate" => run("gsettings", &["set", "org.mate.screensaver", "picture-filename", file_loc.as_str()])?,
        "kde" => {
            let image = format!("file://{}", file_loc);
            run(
                "kwriteconfig5",
                &[
                    "--file", "kscreenlockerrc",
                    "--group", "Greeter", "--group", "Wallpaper", "--group", "org.kde.image", "--group", "General",
                    "--key", "Image", image.as_str(),
                ],
            )?
        }
        _ => {
            return Err(PersistError::new(format!(
                "lock screen wallpaper not supported on '{}'",
                desktop_env
            )))
        }
    };

    if ok {
        log::info!("lock screen wallpaper set to: {}", file_loc);
        Ok(())
    } else {
        Err(PersistError::new(format!("{} rejected the lock screen wallpaper", desktop_env)))
    }
}

fn run(program: &str, args: &[&str]) -> Result<bool, PersistError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| PersistError::new(format!("{}: {}", program, e)))?;
    if !output.status.success() {
        log::debug!("{} exited with {}: {}", program, output.status, String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(output.status.success())
}
