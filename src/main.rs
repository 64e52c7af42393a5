//! MPEG audio to WAVE converter command line tool
//!
//! Decodes MPEG-1/2 Layer I and Layer II streams into 16-bit (or 8-bit)
//! PCM WAVE files. Damaged frames are skipped and decoding resumes at the
//! next valid frame header.

use maponus_rs::{Decoder, DecoderConfig, FrameHeader, OutputChannels, WaveFileBuffer};
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use std::process;
use std::time::Instant;

/// Command line arguments structure
struct Args {
    input_file: String,
    output_file: String,
    output_channels: OutputChannels,
    double_mono: bool,
    verify_crc: bool,
    strict_sync: bool,
    bits_per_sample: u16,
    max_frames: Option<u64>,
    #[cfg(feature = "diagnostics")]
    trace_file: Option<String>,
    quiet: bool,
    verbose: bool,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let args: Vec<String> = env::args().collect();

        if args.len() < 3 {
            return Err("".to_string()); // Empty error triggers usage display
        }

        let mut output_channels = OutputChannels::Both;
        let mut double_mono = false;
        let mut verify_crc = true;
        let mut strict_sync = false;
        let mut bits_per_sample = 16;
        let mut max_frames = None;
        #[cfg(feature = "diagnostics")]
        let mut trace_file = None;
        let mut quiet = false;
        let mut verbose = false;

        let mut i = 1;

        while i < args.len() && args[i].starts_with('-') && args[i] != "-" {
            let arg = &args[i];
            let flag = arg
                .chars()
                .nth(1)
                .ok_or_else(|| format!("Invalid option: {}", arg))?;

            match flag {
                'l' => output_channels = OutputChannels::Left,
                'r' => output_channels = OutputChannels::Right,
                'm' => output_channels = OutputChannels::Downmix,
                'd' => double_mono = true,
                'c' => verify_crc = false,
                's' => strict_sync = true,
                '8' => bits_per_sample = 8,
                'n' => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Option -n requires a frame count".to_string());
                    }
                    let count = args[i]
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid frame count: {}", args[i]))?;
                    max_frames = Some(count);
                }
                #[cfg(feature = "diagnostics")]
                't' => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Option -t requires a file name".to_string());
                    }
                    trace_file = Some(args[i].clone());
                }
                'q' => {
                    quiet = true;
                    verbose = false;
                }
                'v' => {
                    verbose = true;
                    quiet = false;
                }
                'h' => return Err("".to_string()),
                _ => return Err(format!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        if i + 1 >= args.len() {
            return Err("".to_string());
        }

        Ok(Args {
            input_file: args[i].clone(),
            output_file: args[i + 1].clone(),
            output_channels,
            double_mono,
            verify_crc,
            strict_sync,
            bits_per_sample,
            max_frames,
            #[cfg(feature = "diagnostics")]
            trace_file,
            quiet,
            verbose,
        })
    }

    fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig::new()
            .output_channels(self.output_channels)
            .double_mono_to_stereo(self.double_mono)
            .verify_crc(self.verify_crc)
            .strict_sync(self.strict_sync)
    }
}

fn print_usage() {
    println!("Usage: maponus [options] <infile> <outfile>");
    println!();
    println!("Use \"-\" for standard input or output.");
    println!();
    println!("Options:");
    println!(" -h            this help message");
    println!(" -l            decode the left channel only");
    println!(" -r            decode the right channel only");
    println!(" -m            downmix stereo to mono");
    println!(" -d            write mono output as two identical channels");
    println!(" -c            do not check frame CRCs");
    println!(" -s            strict sync, confirm each header by the next one");
    println!(" -8            write 8-bit samples instead of 16-bit");
    println!(" -n <frames>   stop after this many frames");
    #[cfg(feature = "diagnostics")]
    println!(" -t <file>     save a per-frame JSON trace");
    println!(" -q            quiet mode");
    println!(" -v            verbose mode");
}

fn print_name() {
    println!("maponus (MPEG audio Layer I/II decoder)");
}

/// What a conversion produced
#[derive(Default)]
struct Stats {
    frames: u64,
    skipped: u64,
    samples_per_channel: u64,
    first_header: Option<FrameHeader>,
    output_channels: usize,
}

/// Format seconds as hh:mm:ss
fn hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[cfg(feature = "diagnostics")]
fn start_trace<R: Read>(args: &Args, decoder: &mut Decoder<R>) {
    if args.trace_file.is_some() {
        decoder.enable_trace();
    }
}

#[cfg(not(feature = "diagnostics"))]
fn start_trace<R: Read>(_args: &Args, _decoder: &mut Decoder<R>) {}

#[cfg(feature = "diagnostics")]
fn save_trace<R: Read>(
    args: &Args,
    decoder: &mut Decoder<R>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(path), Some(trace)) = (args.trace_file.as_ref(), decoder.take_trace()) {
        trace.save_to_file(path)?;
    }
    Ok(())
}

#[cfg(not(feature = "diagnostics"))]
fn save_trace<R: Read>(
    _args: &Args,
    _decoder: &mut Decoder<R>,
) -> Result<(), Box<dyn std::error::Error>> {
    Ok(())
}

/// Decode `input` into a WAVE file on `sink`
fn decode_stream<R: Read, W: Write + Seek>(
    args: &Args,
    input: R,
    mut sink: W,
) -> Result<(W, Stats), Box<dyn std::error::Error>> {
    let config = args.decoder_config();
    let mut decoder = Decoder::with_config(input, config)?;
    let mut buffer = WaveFileBuffer::with_bits_per_sample(&mut sink, args.bits_per_sample)?
        .double_mono_to_stereo(args.double_mono);
    let mut stats = Stats::default();

    start_trace(args, &mut decoder);

    if args.verbose {
        println!();
        println!("=== Verbose Mode: Frame-by-Frame Decoding Details ===");
        println!("Format: [Frame #] header @ hex offset, samples, peak");
        println!("-------------------------------------------------------------------------------");
    }

    while args.max_frames.map_or(true, |max| stats.frames < max) {
        let offset = decoder.bytes_consumed();
        match decoder.decode_frame(&mut buffer) {
            Ok(header) => {
                if stats.first_header.is_none() {
                    stats.first_header = Some(header);
                    stats.output_channels = decoder.output_channels_for(&header);
                    if args.double_mono && stats.output_channels == 1 {
                        stats.output_channels = 2;
                    }
                }
                stats.frames += 1;
                stats.samples_per_channel += header.samples_per_frame() as u64;
                if args.verbose {
                    println!(
                        "[Frame {}] {} @ 0x{:06X}, {} samples, peak {:.0}",
                        stats.frames,
                        header,
                        offset,
                        header.samples_per_frame(),
                        decoder.last_peak()
                    );
                }
            }
            Err(e) if e.is_recoverable() => {
                stats.skipped += 1;
                if args.verbose {
                    println!("[Skipped] after 0x{:06X}: {}", offset, e);
                }
            }
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => return Err(e.into()),
        }
    }

    if args.verbose {
        println!("-------------------------------------------------------------------------------");
    }

    save_trace(args, &mut decoder)?;

    buffer.finish()?;
    Ok((sink, stats))
}

/// Convert an MPEG audio stream to WAVE
fn convert_to_wav(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let quiet = args.quiet || args.output_file == "-";

    if !quiet {
        print_name();
        println!("Decoding \"{}\" to \"{}\"", args.input_file, args.output_file);
    }

    let input: Box<dyn Read> = if args.input_file == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(&args.input_file)?)
    };
    let input = BufReader::new(input);

    let start_time = Instant::now();

    // WAVE sizes are patched after the data, so stdout output is built in memory
    let stats = if args.output_file == "-" {
        let (cursor, stats) = decode_stream(&args, input, Cursor::new(Vec::new()))?;
        let mut stdout = io::stdout();
        stdout.write_all(&cursor.into_inner())?;
        stdout.flush()?;
        stats
    } else {
        let file = BufWriter::new(File::create(&args.output_file)?);
        decode_stream(&args, input, file)?.1
    };

    let header = match stats.first_header {
        Some(header) => header,
        None => return Err("no decodable MPEG audio frames found".into()),
    };

    let duration = stats.samples_per_channel as f64 / f64::from(header.sample_rate());
    let elapsed = start_time.elapsed();

    if !quiet {
        println!("{}", header);
        println!(
            "WAVE PCM Data, {} {}Hz {}bit, duration: {}",
            if stats.output_channels == 1 { "mono" } else { "stereo" },
            header.sample_rate(),
            args.bits_per_sample,
            hms(duration as u64)
        );
        if stats.skipped > 0 {
            println!("Skipped {} damaged frames", stats.skipped);
        }
        if elapsed.as_secs_f64() > 0.0 {
            println!(
                "Finished in {} ({:.1}x realtime)",
                hms(elapsed.as_secs()),
                duration / elapsed.as_secs_f64()
            );
        } else {
            println!("Finished in {} (infx realtime)", hms(elapsed.as_secs()));
        }
    }

    if args.verbose {
        println!();
        println!("=== Additional Statistics ===");
        println!("Total frames decoded: {}", stats.frames);
        println!("Samples per channel: {}", stats.samples_per_channel);
    }

    Ok(())
}

fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(err) => {
            if err.is_empty() {
                print_usage();
            } else {
                eprintln!("Error: {}", err);
            }
            process::exit(1);
        }
    };

    let level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Error
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    if args.input_file != "-" && !Path::new(&args.input_file).exists() {
        eprintln!("Could not open input file: {}", args.input_file);
        process::exit(1);
    }

    if let Err(err) = convert_to_wav(args) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
