use clap::{Arg, Command};
use route_ingest::CANONICAL_FIELDS;
use std::io::{self, Write};

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Write a synthetic meter-reading route to stdout")
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("with_header")
                .long("with-header")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("latin1")
                .long("latin1")
                .help("Encode the output as windows-1252 instead of UTF-8")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(Arg::new("delim").long("delim").default_value(";"))
        .get_matches();

    let rows: u64 = *matches.get_one("rows").unwrap();
    let with_header = matches.get_flag("with_header");
    let latin1 = matches.get_flag("latin1");
    let delim = matches.get_one::<String>("delim").unwrap().as_str();

    let mut out = io::BufWriter::new(io::stdout().lock());
    let mut emit = |line: String| -> io::Result<()> {
        if latin1 {
            let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&line);
            out.write_all(&bytes)?;
        } else {
            out.write_all(line.as_bytes())?;
        }
        out.write_all(b"\n")
    };

    if with_header {
        emit(CANONICAL_FIELDS.join(delim))?;
    }

    // Zero-padded codes, doubled spaces and a reading on two rows out of three,
    // so normalization and completion have something to do.
    for i in 0..rows {
        let reading = if i % 3 == 2 {
            String::new()
        } else {
            format!("{:06}", 1000 + i * 7)
        };
        let fields = [
            format!("{:02}", i % 12 + 1),
            format!("{:04}", i + 1),
            format!("{:08}", 40_000 + i),
            "A".to_string(),
            format!("{:07}", 900_000 + i),
            format!("Av.  Peñaloza   {}", i + 1),
            "Ñuñoa".to_string(),
            format!("M{:09}", i),
            "5".to_string(),
            "1".to_string(),
            "R1".to_string(),
            format!("{:06}", 1000 + i * 6),
            "0".to_string(),
            String::new(),
            reading,
            format!("{}", 20 + i % 9),
            "0".to_string(),
            format!("{}", 18 + i % 7),
            "0".to_string(),
            String::new(),
            String::new(),
            "0".to_string(),
            format!("-33.{:06}", 450_000 + i),
            format!("-70.{:06}", 600_000 + i),
            "520".to_string(),
        ];
        emit(fields.join(delim))?;
    }

    out.flush()?;
    Ok(())
}
