use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use cubicle_viewer::SceneManifest;

#[derive(Debug, Parser)]
#[command(name = "cubicle-viewer")]
#[command(about = "Assembles and displays the office cubicle scene")]
struct Cli {
    /// Scene manifest (.ron). The built-in office scene is used when omitted.
    manifest: Option<PathBuf>,
}

impl Cli {
    fn scene(&self) -> anyhow::Result<SceneManifest> {
        match &self.manifest {
            Some(path) => SceneManifest::load(path)
                .with_context(|| format!("cannot read scene manifest {}", path.display())),
            None => Ok(SceneManifest::office()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cubicle_viewer::run(cli.scene()?)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn arguments_are_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_argument_selects_the_office_scene() {
        let cli = Cli::try_parse_from(["cubicle-viewer"]).unwrap();
        assert!(cli.manifest.is_none());
        assert_eq!(cli.scene().unwrap().assets.len(), 12);
    }

    #[test]
    fn manifest_path_is_loaded() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/office.ron");
        let cli = Cli::try_parse_from(["cubicle-viewer", path]).unwrap();
        assert_eq!(cli.manifest.as_deref(), Some(std::path::Path::new(path)));
        let scene = cli.scene().unwrap();
        let office = SceneManifest::office();
        assert_eq!(scene.assets, office.assets);
        assert_eq!(scene.clone_rules, office.clone_rules);
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        let err = Cli::try_parse_from(["cubicle-viewer", "--fullscreen"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn missing_manifest_reports_the_path() {
        let cli = Cli::try_parse_from(["cubicle-viewer", "no/such/scene.ron"]).unwrap();
        let err = cli.scene().unwrap_err();
        assert!(format!("{err:#}").contains("no/such/scene.ron"));
    }
}
