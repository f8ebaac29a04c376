//! Command-line front end (§6): `gcode-cli [--mode parse|lower|ail|packet]
//! [--format debug|json] <file>`.
//!
//! Exit codes: `0` success, `1` any diagnostic has severity Error, `2` usage
//! error (unreadable file, bad flag value — the latter is also clap's own
//! exit code for a malformed invocation).

use std::io;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use gcode_diagnostic::{Diagnostic, has_any_error};
use gcode_error::GcodeToolingError;
use gcode_messages::LowerOptions;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Parse,
    Lower,
    Ail,
    Packet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Debug,
    Json,
}

/// Front end for the gcode compiler pipeline.
#[derive(Parser, Debug)]
#[command(name = "gcode-cli", version, about, long_about = None)]
struct Args {
    /// Which pipeline stage to run and report.
    #[arg(long, value_enum, default_value = "parse")]
    mode: Mode,

    /// Output format for the selected stage.
    #[arg(long, value_enum, default_value = "debug")]
    format: Format,

    /// Source file to compile.
    file: PathBuf,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn print_diag(d: &Diagnostic) {
    println!("DIAG line={} col={} sev={} msg=\"{}\"", d.location.line, d.location.column, d.severity.as_str(), d.message);
}

fn print_rejected(rejected: &[gcode_messages::RejectedLine]) {
    for r in rejected {
        println!("REJECT line={} errors={}", r.line, r.reasons.len());
    }
}

fn print_parse_debug(program: &gcode_ast::Program, diagnostics: &[Diagnostic]) {
    for line in &program.lines {
        println!("LINE line={}", line.line_index);
        for word in line.words() {
            match &word.value {
                Some(value) => println!("WORD line={} head={}={}", line.line_index, word.head, value),
                None => println!("WORD line={} head={}", line.line_index, word.head),
            }
        }
    }
    for diag in diagnostics {
        print_diag(diag);
    }
}

fn print_lower_debug(result: &gcode_messages::MessageResult) {
    for message in &result.messages {
        println!("MSG line={}", message.source().line);
    }
    print_rejected(&result.rejected_lines);
    for diag in &result.diagnostics {
        print_diag(diag);
    }
    println!(
        "SUMMARY messages={} rejected={} diagnostics={}",
        result.messages.len(),
        result.rejected_lines.len(),
        result.diagnostics.len()
    );
}

fn print_ail_debug(result: &gcode_ail::AilResult) {
    for instruction in &result.instructions {
        println!("AIL line={} kind={}", instruction.source().line, instruction.kind_str());
    }
    print_rejected(&result.rejected_lines);
    for diag in &result.diagnostics {
        print_diag(diag);
    }
    println!(
        "SUMMARY instructions={} rejected={} diagnostics={}",
        result.instructions.len(),
        result.rejected_lines.len(),
        result.diagnostics.len()
    );
}

fn print_packet_debug(result: &gcode_packet::PacketResult) {
    for packet in &result.packets {
        println!("PACKET id={}", packet.packet_id);
    }
    print_rejected(&result.rejected_lines);
    for diag in &result.diagnostics {
        print_diag(diag);
    }
    println!(
        "SUMMARY packets={} rejected={} diagnostics={}",
        result.packets.len(),
        result.rejected_lines.len(),
        result.diagnostics.len()
    );
}

fn run() -> anyhow::Result<i32> {
    let args = Args::parse();
    init_logging();
    tracing::info!(mode = ?args.mode, format = ?args.format, file = %args.file.display(), "gcode-cli starting");

    let source = std::fs::read_to_string(&args.file)
        .map_err(|source| GcodeToolingError::io(args.file.clone(), source))?;
    let filename = args.file.to_str().map(|s| s.to_string());
    let options = LowerOptions { filename };

    let (program, mut diagnostics) = gcode_parser::parse(&source);

    if args.mode == Mode::Parse {
        match args.format {
            Format::Debug => print_parse_debug(&program, &diagnostics),
            Format::Json => {
                let json = gcode_json::parse_to_json(&program, &diagnostics);
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        return Ok(if has_any_error(&diagnostics) { 1 } else { 0 });
    }

    diagnostics.extend(gcode_semantic::apply_semantic_rules(&program));
    let lower_result = gcode_lower::lower_to_messages(&program, &diagnostics, &options);

    if args.mode == Mode::Lower {
        match args.format {
            Format::Debug => print_lower_debug(&lower_result),
            Format::Json => {
                let json = gcode_json::lower_to_json(&lower_result);
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        return Ok(if has_any_error(&lower_result.diagnostics) { 1 } else { 0 });
    }

    let ail_result = gcode_ail::lower_to_ail(&program, &diagnostics, &options);

    if args.mode == Mode::Ail {
        match args.format {
            Format::Debug => print_ail_debug(&ail_result),
            Format::Json => {
                let json = gcode_json::ail_to_json(&ail_result);
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        return Ok(if has_any_error(&ail_result.diagnostics) { 1 } else { 0 });
    }

    let packet_result =
        gcode_packet::packetize(&ail_result.instructions, &ail_result.diagnostics, &ail_result.rejected_lines);
    match args.format {
        Format::Debug => print_packet_debug(&packet_result),
        Format::Json => {
            let json = gcode_json::packet_to_json(&packet_result);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(if has_any_error(&packet_result.diagnostics) { 1 } else { 0 })
}

fn main() {
    match run() {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("gcode-cli: {err:#}");
            std::process::exit(2);
        }
    }
}
