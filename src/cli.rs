use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Input .json template file
    pub template: PathBuf,
    /// Skip board image generation (the image is produced by an external
    /// renderer from the `board` section, so this is accepted for
    /// compatibility and changes nothing)
    #[arg(long)]
    pub script_only: bool,
    /// After generating, start an interactive session: type entry labels
    /// (`start`, `p1`, `q`, `r`, `c1`, ...) and see the clips played
    #[arg(long)]
    pub play: bool,
}
