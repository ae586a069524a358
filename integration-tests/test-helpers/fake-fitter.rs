// Copyright (c) The fitcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for `molstat-fitter` used by the integration tests.
//!
//! It follows the same standard input contract: a model name on the first line, a data file on
//! the second, then option lines. Known models print canned fit results, preceded by the
//! iteration transcript when the `print` option is given. A few extra model names trigger
//! misbehavior the harness must cope with:
//!
//! * `Hang`: never writes anything and never exits.
//! * `Flood`: writes a large amount of text to both standard output and standard error.
//! * `Crash`: prints a message to standard error and exits with status 3.
//! * `Echo`: copies its standard input to standard output.

use std::{
    fs,
    io::{self, BufRead, Read, Write},
    process::ExitCode,
    time::Duration,
};

/// Bytes written to each stream by `Flood` unless a `bytes N` option says otherwise.
const DEFAULT_FLOOD_BYTES: usize = 4 * 1024 * 1024;

fn main() -> ExitCode {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines().map_while(Result::ok);

    let Some(model) = lines.next() else {
        eprintln!("Error: model name expected in line 1.");
        return ExitCode::SUCCESS;
    };
    let model = model.trim().to_owned();

    match model.as_str() {
        "Hang" => loop {
            std::thread::sleep(Duration::from_secs(3600));
        },
        "Echo" => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{model}").expect("wrote to stdout");
            for line in lines {
                writeln!(stdout, "{line}").expect("wrote to stdout");
            }
            return ExitCode::SUCCESS;
        }
        "Crash" => {
            eprintln!("fatal: the fitter crashed");
            return ExitCode::from(3);
        }
        "Flood" => {
            let options: Vec<_> = lines.collect();
            flood(flood_bytes(&options));
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let Some(data_file) = lines.next() else {
        eprintln!("Error: file name expected in line 2.");
        return ExitCode::SUCCESS;
    };
    let data_file = data_file.trim().to_owned();
    let options: Vec<_> = lines.collect();

    let contents = match fs::File::open(&data_file) {
        Ok(mut f) => {
            let mut contents = String::new();
            if f.read_to_string(&mut contents).is_err() {
                eprintln!("Error reading {data_file}.");
                return ExitCode::SUCCESS;
            }
            contents
        }
        Err(_) => {
            eprintln!("Error opening {data_file} for input.");
            return ExitCode::SUCCESS;
        }
    };

    let points = match parse_points(&contents) {
        Ok(points) => points,
        Err(line) => {
            eprintln!("Error: malformed data on line {line} of {data_file}.");
            return ExitCode::from(1);
        }
    };
    if points == 0 {
        eprintln!("Error: no data points in {data_file}.");
        return ExitCode::from(1);
    }

    let Some(fit) = canned_fit(&model, &options) else {
        eprintln!("Error: unknown model '{model}'.");
        return ExitCode::SUCCESS;
    };

    let mut stdout = io::stdout().lock();
    if options.iter().any(|option| option.trim() == "print") {
        for iteration in fit.iterations {
            writeln!(stdout, "{iteration}").expect("wrote to stdout");
        }
        writeln!(stdout, "Residual = {}\n", fit.resid).expect("wrote to stdout");
    }
    writeln!(stdout, "Resid = {}", fit.resid).expect("wrote to stdout");
    writeln!(stdout, "{}", fit.params).expect("wrote to stdout");
    ExitCode::SUCCESS
}

struct CannedFit {
    iterations: &'static [&'static str],
    resid: &'static str,
    params: &'static str,
}

/// Results recorded from the real fitter, keyed by model and by the options that change them.
fn canned_fit(model: &str, options: &[String]) -> Option<CannedFit> {
    let has_option = |prefix: &str| options.iter().any(|option| option.trim().starts_with(prefix));

    let fit = match model {
        "SymmetricNonresonant" if has_option("bin log") => CannedFit {
            iterations: &[],
            resid: "2.752118e+01",
            params: "c=5.8240e+01, d=9.6983e+00, norm=1.1800e+01",
        },
        "SymmetricNonresonant" if options.is_empty() => CannedFit {
            iterations: &[],
            resid: "1.599687e+04",
            params: "c=5.9267e+01, d=9.8774e+00, norm=1.0206e+05",
        },
        "SymmetricNonresonant" => CannedFit {
            iterations: &[
                "Iter=  0, c=6.0000e+01, d=1.0000e+01, norm=1.0000e+00",
                "Iter=  1, c=3.9143e+01, d=6.4286e+00, norm=1.1799e+01",
                "Iter=  2, c=5.9172e+01, d=9.8836e+00, norm=1.1650e+01",
                "Iter=  3, c=5.8225e+01, d=9.6957e+00, norm=1.1796e+01",
                "Iter=  4, c=5.8240e+01, d=9.6983e+00, norm=1.1800e+01",
                "Iter=  5, c=5.8240e+01, d=9.6984e+00, norm=1.1800e+01",
            ],
            resid: "2.752039e+01",
            params: "c=5.8240e+01, d=9.6984e+00, norm=1.1800e+01",
        },
        "SymmetricResonant" => CannedFit {
            iterations: &[
                "Iter=  0, gamma=8.0000e+00, norm=3.0000e+00",
                "Iter=  1, gamma=1.0225e+01, norm=3.8700e+00",
                "Iter=  2, gamma=9.9417e+00, norm=3.9589e+00",
                "Iter=  3, gamma=9.9460e+00, norm=3.9567e+00",
                "Iter=  4, gamma=9.9462e+00, norm=3.9567e+00",
            ],
            resid: "4.310146e-01",
            params: "gamma=9.9462e+00, norm=3.9567e+00",
        },
        "AsymmetricResonant" if has_option("guess") => CannedFit {
            iterations: &[
                "Iter=  0, gammaL=1.7000e+01, gammaR=1.2000e+01, r=2.5000e+01, norm=8.0000e+00",
                "Iter=  1, gammaL=1.6531e+01, gammaR=1.1350e+01, r=2.5219e+01, norm=8.1379e+00",
                "Iter=  2, gammaL=1.7103e+01, gammaR=1.1748e+01, r=2.3902e+01, norm=7.7229e+00",
                "Iter=  3, gammaL=1.7102e+01, gammaR=1.1749e+01, r=2.3910e+01, norm=7.7203e+00",
                "Iter=  4, gammaL=1.7103e+01, gammaR=1.1751e+01, r=2.3909e+01, norm=7.7142e+00",
                "Iter=  5, gammaL=1.7103e+01, gammaR=1.1751e+01, r=2.3909e+01, norm=7.7141e+00",
            ],
            resid: "5.084054e+00",
            params: "gammaL=1.7103e+01, gammaR=1.1751e+01, r=2.3909e+01, norm=7.7141e+00",
        },
        "AsymmetricResonant" => CannedFit {
            iterations: &[],
            resid: "4.895159e+00",
            params: "gammaL=1.7085e+01, gammaR=1.1731e+01, r=2.5489e+01, norm=8.2639e+00",
        },
        _ => return None,
    };
    Some(fit)
}

/// Counts the (conductance, density) pairs in a data file.
///
/// Returns the 1-based line number of the first malformed line on error.
fn parse_points(contents: &str) -> Result<usize, usize> {
    let mut points = 0;
    for (index, line) in contents.lines().enumerate() {
        let fields: Vec<_> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [g, pdf] if g.parse::<f64>().is_ok() && pdf.parse::<f64>().is_ok() => points += 1,
            _ => return Err(index + 1),
        }
    }
    Ok(points)
}

fn flood_bytes(options: &[String]) -> usize {
    options
        .iter()
        .find_map(|option| option.trim().strip_prefix("bytes "))
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(DEFAULT_FLOOD_BYTES)
}

fn flood(total: usize) {
    let line = "Iter=  0, c=6.0000e+01, d=1.0000e+01, norm=1.0000e+04\n";
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    let mut written = 0;
    // Alternate between the streams so a reader that drains only one of them blocks the writer.
    while written < total {
        stdout.write_all(line.as_bytes()).expect("wrote to stdout");
        stderr.write_all(line.as_bytes()).expect("wrote to stderr");
        written += line.len();
    }
    stdout.flush().expect("flushed stdout");
}
