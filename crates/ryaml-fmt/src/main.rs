use std::io::Read;

use clap::Parser;
use ryaml::{DumpConfig, Encoding, LineBreak, ScalarStyle};

/// Reformat a YAML stream.
#[derive(clap::Parser, Debug)]
struct Args {
    #[clap(value_parser, default_value = "-")]
    input: clio::Input,
    #[clap(value_parser, default_value = "-")]
    output: clio::Output,

    /// Spaces per indentation level.
    #[clap(long, default_value_t = 2)]
    indent: usize,
    /// Preferred line width.
    #[clap(long, default_value_t = 80, conflicts_with = "no_wrap")]
    width: usize,
    /// Never wrap long lines.
    #[clap(long)]
    no_wrap: bool,
    /// Collection style.
    #[clap(long, value_enum, default_value_t = FlowStyle::Block)]
    flow: FlowStyle,
    /// Style forced on every scalar.
    #[clap(long, value_enum)]
    style: Option<Style>,
    #[clap(long)]
    canonical: bool,
    /// Write non-ASCII characters unescaped.
    #[clap(long)]
    allow_unicode: bool,
    #[clap(long, value_enum, default_value_t = Break::Lf)]
    line_break: Break,
    /// Output encoding. UTF-16 output starts with a byte order mark.
    #[clap(long, value_enum)]
    encoding: Option<OutputEncoding>,
    #[clap(long)]
    explicit_start: bool,
    #[clap(long)]
    explicit_end: bool,
    /// Write a `%YAML` directive, e.g. `1.1`.
    #[clap(long, value_parser = parse_version)]
    yaml_version: Option<(u32, u32)>,
    /// Write a `%TAG` directive, as `HANDLE=PREFIX`.
    #[clap(long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, String)>,
    /// Keep mapping keys in their original order.
    #[clap(long)]
    no_sort_keys: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FlowStyle {
    Block,
    Flow,
    /// Flow style only for collections of plain scalars.
    Auto,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Style {
    Plain,
    Single,
    Double,
    Literal,
    Folded,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Break {
    Lf,
    Cr,
    Crlf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OutputEncoding {
    Utf8,
    Utf16le,
    Utf16be,
}

fn parse_version(s: &str) -> Result<(u32, u32), String> {
    let (major, minor) = s
        .split_once('.')
        .ok_or_else(|| format!("expected MAJOR.MINOR, got {s:?}"))?;
    let major = major.parse().map_err(|err| format!("{err}"))?;
    let minor = minor.parse().map_err(|err| format!("{err}"))?;
    Ok((major, minor))
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    let (handle, prefix) = s
        .split_once('=')
        .ok_or_else(|| format!("expected HANDLE=PREFIX, got {s:?}"))?;
    Ok((handle.to_owned(), prefix.to_owned()))
}

impl Args {
    fn config(&self) -> DumpConfig {
        DumpConfig {
            default_style: self.style.map(|style| match style {
                Style::Plain => ScalarStyle::Plain,
                Style::Single => ScalarStyle::SingleQuoted,
                Style::Double => ScalarStyle::DoubleQuoted,
                Style::Literal => ScalarStyle::Literal,
                Style::Folded => ScalarStyle::Folded,
            }),
            default_flow_style: match self.flow {
                FlowStyle::Block => Some(false),
                FlowStyle::Flow => Some(true),
                FlowStyle::Auto => None,
            },
            canonical: self.canonical,
            indent: self.indent,
            width: (!self.no_wrap).then_some(self.width),
            allow_unicode: self.allow_unicode,
            line_break: match self.line_break {
                Break::Lf => LineBreak::Lf,
                Break::Cr => LineBreak::Cr,
                Break::Crlf => LineBreak::CrLf,
            },
            encoding: self.encoding.map(|encoding| match encoding {
                OutputEncoding::Utf8 => Encoding::Utf8,
                OutputEncoding::Utf16le => Encoding::Utf16Le,
                OutputEncoding::Utf16be => Encoding::Utf16Be,
            }),
            explicit_start: self.explicit_start,
            explicit_end: self.explicit_end,
            version: self.yaml_version,
            tags: self.tags.clone(),
            sort_keys: !self.no_sort_keys,
        }
    }
}

fn main() {
    env_logger::init();
    let mut args = Args::parse();
    let config = args.config();

    let mut input = args.input.lock();
    let mut bytes = Vec::new();
    if let Err(err) = input.read_to_end(&mut bytes) {
        eprintln!("Reading error: {err}");
        std::process::exit(1);
    }

    let docs = match ryaml::loads_all_bytes(&bytes) {
        Ok(docs) => docs,
        Err(err) => {
            eprintln!("Parsing error: {err}");
            std::process::exit(1);
        }
    };
    std::mem::drop(input);
    log::debug!("read {} documents", docs.len());

    let mut output = args.output.lock();
    if let Err(err) = ryaml::dump_all(&mut *output, &docs, &config) {
        std::mem::drop(output);
        eprintln!("Emitting error: {err}");
        std::process::exit(1);
    }
}
