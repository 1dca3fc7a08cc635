use schemport::{ConversionGateway, Edition, StructureCache, StructureFormat};
use schemport_logger::{log, LogSeverity};
use std::env;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

/// Converts one structure file to another format, both inferred from file
/// extensions: `schemport <input> <output>`.
fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: schemport <input.(schem|litematic|mcstructure)> <output.(schem|litematic|mcstructure)>");
        return ExitCode::FAILURE;
    }

    match run(&args[1], &args[2]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            log(&message, LogSeverity::Fatal);
            ExitCode::FAILURE
        }
    }
}

fn run(input: &str, output: &str) -> Result<(), String> {
    let bytes = fs::read(input).map_err(|e| format!("cannot read {}: {}", input, e))?;

    let source = StructureFormat::sniff(&bytes)
        .or_else(|| format_of(input))
        .ok_or_else(|| format!("cannot determine format of {}", input))?;
    let target = format_of(output).ok_or_else(|| format!("cannot determine format of {}", output))?;

    let gateway = ConversionGateway::new(StructureCache::new());
    let metadata = gateway
        .parse_structure(&bytes, source.extension())
        .map_err(|e| e.to_string())?;

    let structure_id = gateway.new_structure_id();
    gateway
        .register_parsed_data(&structure_id)
        .map_err(|e| e.to_string())?;

    let export = gateway
        .export_structure(&structure_id, target.extension(), edition_of(target), "1.20")
        .map_err(|e| e.to_string())?;

    fs::write(output, &export.data).map_err(|e| format!("cannot write {}: {}", output, e))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&metadata).map_err(|e| e.to_string())?
    );
    Ok(())
}

fn format_of(path: &str) -> Option<StructureFormat> {
    let extension = Path::new(path).extension()?.to_str()?;
    StructureFormat::from_name(extension)
}

fn edition_of(format: StructureFormat) -> Edition {
    match format {
        StructureFormat::Mcstructure => Edition::Bedrock,
        _ => Edition::Java,
    }
}
