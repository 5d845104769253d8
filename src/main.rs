use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "text-overlay-rust",
    version,
    about = "Place text boxes over an image and export the composite"
)]
struct Cli {
    /// Background image
    #[arg(short = 'i', long = "image")]
    image: String,

    /// Output PNG path
    #[arg(short = 'o', long = "output", default_value = "image-with-text.png")]
    output: String,

    /// Text for a new box (repeat for more boxes; none places one default box)
    #[arg(short = 't', long = "text")]
    text: Vec<String>,

    /// Mirror the image horizontally
    #[arg(long = "flip-x")]
    flip_x: bool,

    /// Mirror the image vertically
    #[arg(long = "flip-y")]
    flip_y: bool,

    /// Padding band: none, top, bottom, both
    #[arg(short = 'p', long = "padding")]
    padding: Option<String>,

    /// Padding size as a fraction of the image height (0..1)
    #[arg(long = "padding-percent")]
    padding_percent: Option<f32>,

    /// Padding color (CSS color)
    #[arg(long = "padding-color")]
    padding_color: Option<String>,

    /// Preview container width in px (box defaults are placed against it)
    #[arg(long = "preview-width")]
    preview_width: Option<f32>,

    /// Also write the highlighted preview to this PNG path
    #[arg(long = "preview-output")]
    preview_output: Option<String>,

    /// Font file used for measurement and rendering
    #[arg(short = 'f', long = "font")]
    font: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    text_overlay_rust::logging::init(cli.verbose)?;

    let output = text_overlay_rust::run(text_overlay_rust::Config {
        image: cli.image,
        output: cli.output,
        texts: cli.text,
        flip_x: cli.flip_x,
        flip_y: cli.flip_y,
        padding: cli.padding,
        padding_percent: cli.padding_percent,
        padding_color: cli.padding_color,
        preview_width: cli.preview_width,
        preview_output: cli.preview_output,
        font: cli.font,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
