use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use wallpick_core::{Destination, Dimensions, Offset};

/// Wallpick - crop an image to your screen and set it as wallpaper.
#[derive(Parser, Debug)]
#[command(name = "wallpick")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub surface: SurfaceArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the screen and the crop surface policy.
#[derive(Args, Debug, Clone, Default)]
pub struct SurfaceArgs {
    /// Screen size, e.g. 1080x1920. Defaults to the configured screen.
    #[arg(long, global = true, value_name = "WxH")]
    pub screen: Option<Dimensions>,

    /// Crop surface size relative to the screen (at least 1.0).
    #[arg(long, global = true)]
    pub scale: Option<f64>,

    /// Pixels added to every side of the crop surface.
    #[arg(long, global = true)]
    pub inset: Option<i32>,
}

/// Adjustments applied on top of the default framing.
#[derive(Args, Debug, Clone, Default)]
pub struct FramingArgs {
    /// Zoom factor; must not go below the minimum zoom.
    #[arg(long)]
    pub zoom: Option<f64>,

    /// Pan in scaled pixels, e.g. -120,40.
    #[arg(long, value_name = "DX,DY", allow_hyphen_values = true)]
    pub scroll: Option<Offset>,

    /// Frame from the leading edge instead of the center.
    #[arg(long)]
    pub align_start: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show how an image would be cropped.
    Preview {
        image: PathBuf,

        #[command(flatten)]
        framing: FramingArgs,
    },

    /// Crop an image and set it as wallpaper.
    Set {
        image: PathBuf,

        /// home, lock or both.
        #[arg(long, default_value = "both")]
        dest: Destination,

        #[command(flatten)]
        framing: FramingArgs,

        /// Exit with an error instead of offering to retry failed destinations.
        #[arg(long)]
        no_retry: bool,
    },

    /// List recently committed wallpapers.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_set_with_global_overrides() {
        let cli = Cli::try_parse_from([
            "wallpick", "set", "photo.jpg", "--dest", "lock-screen", "--scroll", "-40,12", "--screen", "1080x2340",
            "--scale", "1.2",
        ])
        .unwrap();

        assert_eq!(cli.surface.screen, Some(Dimensions::new(1080, 2340)));
        assert_eq!(cli.surface.scale, Some(1.2));
        match cli.command {
            Command::Set { image, dest, framing, no_retry } => {
                assert_eq!(image, PathBuf::from("photo.jpg"));
                assert_eq!(dest, Destination::Lock);
                assert_eq!(framing.scroll, Some(Offset::new(-40, 12)));
                assert!(!no_retry);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn set_defaults_to_both_destinations() {
        let cli = Cli::try_parse_from(["wallpick", "set", "photo.jpg"]).unwrap();
        assert!(matches!(cli.command, Command::Set { dest: Destination::Both, .. }));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(Cli::try_parse_from(["wallpick", "--screen", "1080", "history"]).is_err());
        assert!(Cli::try_parse_from(["wallpick", "set", "a.jpg", "--dest", "desk"]).is_err());
    }
}
