//! Standalone PDF text extractor binary.
//!
//! Run as a subprocess to isolate `pdf-extract` crashes from a calling
//! process: the library can panic on malformed PDFs, and then only this
//! process dies. Extracted text goes to stdout, diagnostics to stderr.
//!
//! Usage: pdf_extractor <path_to_pdf>
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments
//!   2 - PDF read error
//!   3 - PDF extraction error
//!   4 - PDF validation failed

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;

use portfolio_ingest::pdf::{self, PdfError};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: pdf_extractor <path_to_pdf>");
        return ExitCode::from(1);
    }

    match pdf::extract_text(args[1].as_ref()) {
        Ok(text) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            if let Err(e) = handle.write_all(text.as_bytes()) {
                eprintln!("WRITE_ERROR:{e}");
                return ExitCode::from(3);
            }
            ExitCode::SUCCESS
        }
        Err(PdfError::Read { source, .. }) => {
            eprintln!("READ_ERROR:{source}");
            ExitCode::from(2)
        }
        Err(PdfError::Invalid(message)) => {
            eprintln!("VALIDATE_ERROR:{message}");
            ExitCode::from(4)
        }
        Err(PdfError::Extract(message)) => {
            eprintln!("EXTRACT_ERROR:{message}");
            ExitCode::from(3)
        }
    }
}
