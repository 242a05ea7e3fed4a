use std::fs;

use buro_extract::{analyze, pages_from_json, ErrorReport, ExtractError};

fn print_usage(program: &str) {
    eprintln!("Usage: {} <tokens.json> [options]", program);
    eprintln!();
    eprintln!("Analyzes a positioned-token dump (pdf2json format) of a credit");
    eprintln!("bureau report and prints the extracted totals, monthly history");
    eprintln!("and KPIs as JSON.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --only-totals   Fail unless the totals row itself is found");
    eprintln!("  -o FILE         Write output to FILE instead of stdout");
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let path = &args[1];
    if path == "--help" || path == "-h" {
        print_usage(&args[0]);
        return;
    }

    let mut only_totals = false;
    let mut output_file: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--only-totals" => only_totals = true,
            "-o" => {
                i += 1;
                if i < args.len() {
                    output_file = Some(args[i].clone());
                }
            }
            _ => {}
        }
        i += 1;
    }

    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) => fail(&format!("No se pudo leer el archivo: {e}"), 1),
    };

    let pages = match pages_from_json(&data) {
        Ok(p) => p,
        Err(e) => fail(&e.to_string(), 1),
    };

    let report = match analyze(&pages, only_totals) {
        Ok(r) => r,
        Err(e @ ExtractError::TotalsNotFound) => fail(&e.to_string(), 2),
        Err(e) => fail(&e.to_string(), 1),
    };

    let json = match serde_json::to_string_pretty(&report) {
        Ok(j) => j,
        Err(e) => fail(&e.to_string(), 1),
    };

    match output_file {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                fail(&format!("Failed to write output: {e}"), 1);
            }
            eprintln!("Output written to: {path}");
        }
        None => println!("{json}"),
    }
}

fn fail(message: &str, code: i32) -> ! {
    let body = ErrorReport::new(message);
    let json = serde_json::to_string(&body)
        .unwrap_or_else(|_| format!("{{\"ok\":false,\"error\":{message:?}}}"));
    eprintln!("{json}");
    std::process::exit(code);
}
