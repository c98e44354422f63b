use std::path::PathBuf;

use atelier_core::{AspectRatio, GenerationConfig, OutputFormat, TagSelection};
use clap::{Parser, Subcommand};

/// Atelier image generation studio
#[derive(Debug, Parser)]
#[command(name = "atelier", about = "Generate images across multiple providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "atelier.toml", env = "ATELIER_CONFIG")]
    pub config: PathBuf,

    /// Log filter, e.g. `info` or `atelier_studio=debug`
    #[arg(long, default_value = "info", env = "ATELIER_LOG")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate images and print their URLs
    Generate(GenerateArgs),
    /// Print the estimated cost of a generation without running it
    Estimate(GenerateArgs),
    /// Probe every configured model's provider
    Status,
    /// List configured models
    Models,
}

#[derive(Debug, clap::Args)]
pub struct GenerateArgs {
    /// Base prompt, tags are appended to it
    pub prompt: String,

    /// Model id, defaults to the first configured model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Number of images
    #[arg(short = 'n', long)]
    pub outputs: Option<u32>,

    /// Inference steps, defaults to the model's default
    #[arg(long)]
    pub steps: Option<u32>,

    /// Aspect ratio such as `1:1` or `16:9`
    #[arg(long)]
    pub aspect_ratio: Option<AspectRatio>,

    /// Output format (`webp`, `jpg`, `png`)
    #[arg(long)]
    pub format: Option<OutputFormat>,

    #[arg(long)]
    pub art_style: Option<String>,

    #[arg(long)]
    pub theme: Option<String>,

    #[arg(long)]
    pub mood: Option<String>,

    /// Technical tag, repeatable
    #[arg(long = "technical")]
    pub technical: Vec<String>,

    /// Composition tag, repeatable
    #[arg(long = "composition")]
    pub composition: Vec<String>,

    /// Enhancement tag, repeatable
    #[arg(long = "enhancement")]
    pub enhancement: Vec<String>,

    /// Append the quality enhancement phrase
    #[arg(long)]
    pub quality: bool,
}

impl GenerateArgs {
    fn tags(&self) -> TagSelection {
        TagSelection {
            art_style: self.art_style.clone(),
            theme: self.theme.clone(),
            mood: self.mood.clone(),
            technical: self.technical.clone(),
            composition: self.composition.clone(),
            enhancement: self.enhancement.clone(),
            quality_enhancement: self.quality,
        }
    }

    /// Apply the flags on top of a model's default config
    pub fn apply(&self, mut config: GenerationConfig) -> GenerationConfig {
        config.prompt.clone_from(&self.prompt);
        if let Some(outputs) = self.outputs {
            config.num_outputs = outputs;
        }
        if let Some(steps) = self.steps {
            config.num_inference_steps = steps;
        }
        if let Some(ratio) = self.aspect_ratio {
            config.aspect_ratio = ratio;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }

        let tags = self.tags();
        config.tags = (!tags.is_empty()).then_some(tags);
        config
    }
}
