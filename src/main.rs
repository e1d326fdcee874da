use std::fs;
use std::io::{BufReader, IsTerminal};
use std::os::fd::AsFd;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use termsnap_lib::{
    read_cast, render_animation, render_still_frames, CastWriter, FrameSamplerOptions,
    SvgTemplate,
};

mod config;
mod poll;
mod pty_recorder;
mod terminal_state;
mod utf8_decoder;


use config::ConfigManager;
use terminal_state::TerminalState;

/// Record a terminal session and render it as a looping SVG animation.
#[derive(Debug, Parser)]
#[command(name = "termcap", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a terminal session to a cast file.
    Record {
        /// Where to write the recorded cast.
        output: PathBuf,
        /// Terminal geometry as COLSxROWS. Defaults to the configured geometry.
        #[arg(short, long)]
        geometry: Option<String>,
        /// Program to run. Defaults to $SHELL.
        program: Option<String>,
        /// Arguments passed to `program`.
        #[arg(trailing_var_arg(true))]
        args: Vec<String>,
    },
    /// Render a cast file to an SVG animation, or a directory of still frames.
    Render {
        /// The cast file to render.
        input: PathBuf,
        /// Where to write the rendered SVG (or, with `--still-frames`, the directory to fill
        /// with numbered frame files).
        output: PathBuf,
        /// SVG template to render into. Defaults to the configured template.
        #[arg(short, long)]
        template: Option<String>,
        /// Minimum frame duration, in milliseconds.
        #[arg(short = 'm', long = "min-duration")]
        min_duration: Option<u64>,
        /// Maximum frame duration, in milliseconds.
        #[arg(short = 'M', long = "max-duration")]
        max_duration: Option<u64>,
        /// Delay appended to the final frame before the animation loops, in milliseconds.
        #[arg(short = 'D', long = "loop-delay")]
        loop_delay: Option<u64>,
        /// Write one SVG file per frame instead of a single looping animation.
        #[arg(short, long)]
        still_frames: bool,
    },
    /// Inspect or edit the persisted configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage custom SVG templates.
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print every setting.
    Show,
    /// Print a single setting.
    Get { section: String, key: String },
    /// Set a single setting and persist it.
    Set {
        section: String,
        key: String,
        value: String,
    },
    /// Restore every setting to its default value.
    Reset,
}

#[derive(Debug, Subcommand)]
enum TemplateAction {
    /// List every resolvable template.
    List,
    /// Install `path` as a custom template named `name`.
    Install { name: String, path: PathBuf },
    /// Remove a custom template.
    Remove { name: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ConfigManager::load()?;

    let result = match cli.command {
        Command::Record {
            output,
            geometry,
            program,
            args,
        } => record(&mut config, output, geometry, program, args),
        Command::Render {
            input,
            output,
            template,
            min_duration,
            max_duration,
            loop_delay,
            still_frames,
        } => render(
            &config,
            input,
            output,
            template,
            min_duration,
            max_duration,
            loop_delay,
            still_frames,
        ),
        Command::Config { action } => config_command(&mut config, action),
        Command::Template { action } => template_command(&config, action),
    };

    if let Err(err) = &result {
        eprintln!("error: {err}");
    }
    result
}

fn record(
    config: &mut ConfigManager,
    output: PathBuf,
    geometry: Option<String>,
    program: Option<String>,
    args: Vec<String>,
) -> anyhow::Result<()> {
    let geometry = geometry.unwrap_or_else(|| config.settings().general.default_geometry.clone());
    let (columns, rows) = parse_geometry(&geometry)?;

    let program = program
        .or_else(|| std::env::var("SHELL").ok())
        .unwrap_or_else(|| "/bin/bash".to_owned());

    let mut stdin = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();

    let _raw_mode = stdin
        .as_fd()
        .is_terminal()
        .then(|| TerminalState::enter_raw(&stdin))
        .transpose()?;

    let file = fs::File::create(&output)?;
    let mut writer = CastWriter::new(file);

    pty_recorder::record_session(
        program,
        args,
        columns,
        rows,
        &mut stdin,
        &mut stdout,
        &mut writer,
    )?;

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render(
    config: &ConfigManager,
    input: PathBuf,
    output: PathBuf,
    template: Option<String>,
    min_duration: Option<u64>,
    max_duration: Option<u64>,
    loop_delay: Option<u64>,
    still_frames: bool,
) -> anyhow::Result<()> {
    let settings = &config.settings().general;
    let template_name = template.unwrap_or_else(|| settings.default_template.clone());
    let min_frame_dur_ms = min_duration.unwrap_or(settings.default_min_duration);
    let max_frame_dur_ms = Some(max_duration.unwrap_or(settings.default_max_duration));
    let last_frame_dur_ms = loop_delay.unwrap_or(settings.default_loop_delay);

    let file = fs::File::open(&input)?;
    let (header, events) = read_cast(BufReader::new(file))?;

    let options = FrameSamplerOptions {
        min_frame_dur_ms,
        max_frame_dur_ms,
        last_frame_dur_ms,
    };
    let (columns, rows, frames) = termsnap_lib::sample_frames(events, &header, options)?;

    let template_xml = config.template_content(&template_name)?;
    let template = SvgTemplate::parse(&template_xml)?;

    if still_frames {
        fs::create_dir_all(&output)?;
        let documents = render_still_frames(&template, columns, rows, &frames)?;
        for (index, document) in documents.iter().enumerate() {
            let path = output.join(format!("frame_{index:05}.svg"));
            fs::write(path, document)?;
        }
    } else {
        let document = render_animation(&template, columns, rows, &frames)?;
        fs::write(&output, document)?;
    }

    Ok(())
}

fn config_command(config: &mut ConfigManager, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            for (key, value) in config.as_map()? {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Get { section, key } => {
            let full_key = format!("{section}.{key}");
            match config.as_map()?.get(&full_key) {
                Some(value) => println!("{full_key} = {value}"),
                None => println!("configuration key {full_key} not found"),
            }
        }
        ConfigAction::Set { section, key, value } => {
            set_setting(config, &section, &key, &value)?;
            config.save()?;
            println!("set {section}.{key} = {value}");
        }
        ConfigAction::Reset => config.reset()?,
    }
    Ok(())
}

fn set_setting(
    config: &mut ConfigManager,
    section: &str,
    key: &str,
    value: &str,
) -> anyhow::Result<()> {
    let general = &mut config.settings_mut().general;
    match (section, key) {
        ("general", "default_template") => general.default_template = value.to_owned(),
        ("general", "default_geometry") => general.default_geometry = value.to_owned(),
        ("general", "default_min_duration") => general.default_min_duration = value.parse()?,
        ("general", "default_max_duration") => general.default_max_duration = value.parse()?,
        ("general", "default_loop_delay") => general.default_loop_delay = value.parse()?,
        _ => anyhow::bail!("unknown configuration key {section}.{key}"),
    }
    Ok(())
}

fn template_command(config: &ConfigManager, action: TemplateAction) -> anyhow::Result<()> {
    match action {
        TemplateAction::List => {
            for name in config.available_templates() {
                println!("{name}");
            }
        }
        TemplateAction::Install { name, path } => {
            config.install_template(&name, &path)?;
            println!("template \"{name}\" installed");
        }
        TemplateAction::Remove { name } => {
            config.remove_template(&name)?;
            println!("template \"{name}\" removed");
        }
    }
    Ok(())
}

/// Parses a `COLSxROWS` geometry string, e.g. `"82x19"`.
fn parse_geometry(geometry: &str) -> anyhow::Result<(u16, u16)> {
    let (columns, rows) = geometry
        .split_once('x')
        .ok_or_else(|| anyhow::anyhow!("invalid geometry {geometry:?}, expected COLSxROWS"))?;
    Ok((columns.parse()?, rows.parse()?))
}
