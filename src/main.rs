use clap::Parser;
use jinjet::cli::{generate_completions, AppConfig, Args, Commands};
use jinjet::diagnostic::DiagnosticRenderer;
use jinjet::{Options, Template};
use owo_colors::OwoColorize;
use std::io::{self, Read, Write};
use std::path::Path;

fn main() {
    let args = Args::parse();

    if let Some(Commands::Complete { shell }) = args.command {
        generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);

    verbose_log(&config, "Starting jinjet");

    let (source, source_name) = match read_template_input(&args, &config) {
        Ok(pair) => pair,
        Err(e) => {
            error_message(&config, &e);
            std::process::exit(1);
        }
    };

    verbose_log(
        &config,
        &format!("Read {} bytes of template source", source.len()),
    );

    let options = Options {
        trim_blocks: args.trim_blocks,
        lstrip_blocks: args.lstrip_blocks,
    };

    let template = match Template::with_options(&source, options) {
        Ok(template) => template,
        Err(e) => {
            report_error(&source, &source_name, &e, &config);
            std::process::exit(1);
        }
    };

    let output = if args.fmt {
        verbose_log(&config, "Reformatting template");
        template.format(args.indent)
    } else {
        let context = match read_context_input(&args, &config) {
            Ok(value) => value,
            Err(e) => {
                error_message(&config, &e);
                std::process::exit(1);
            }
        };

        if args.missing {
            verbose_log(&config, "Rendering in missing-variable mode");
            match template.missing_variables(&context) {
                Ok((rendered, missing)) => {
                    for name in &missing {
                        eprintln!("missing: {}", name);
                    }
                    rendered
                }
                Err(e) => {
                    report_error(&source, &source_name, &e, &config);
                    std::process::exit(1);
                }
            }
        } else {
            verbose_log(&config, "Rendering template");
            match template.render(&context) {
                Ok(rendered) => rendered,
                Err(e) => {
                    report_error(&source, &source_name, &e, &config);
                    std::process::exit(1);
                }
            }
        }
    };

    if let Some(out_path) = &args.out {
        verbose_log(
            &config,
            &format!("Writing output to file: {}", out_path.display()),
        );
        if let Err(e) = std::fs::write(out_path, &output) {
            error_message(&config, &format!("Error writing to output file: {}", e));
            std::process::exit(1);
        }
    } else {
        print!("{}", output);
        if !output.ends_with('\n') {
            println!();
        }
        io::stdout().flush().unwrap();
    }
}

fn read_template_input(args: &Args, config: &AppConfig) -> Result<(String, String), String> {
    if let Some(file) = &args.file {
        verbose_log(
            config,
            &format!("Reading template from file: {}", file.display()),
        );
        Ok((read_file(file)?, file.display().to_string()))
    } else if let Some(template) = &args.template {
        verbose_log(config, "Reading template from command-line argument");
        Ok((template.clone(), "template".to_string()))
    } else {
        verbose_log(config, "Reading template from stdin");
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;

        if buffer.is_empty() {
            return Err(
                "No input provided. Must provide --file, a template string argument, or a template via stdin".to_string(),
            );
        }

        Ok((buffer, "stdin".to_string()))
    }
}

fn read_context_input(args: &Args, config: &AppConfig) -> Result<serde_json::Value, String> {
    let raw = if let Some(context) = &args.context {
        verbose_log(config, "Using context from command-line argument");
        context.clone()
    } else if let Some(context_file) = &args.context_file {
        verbose_log(
            config,
            &format!("Reading context from file: {}", context_file.display()),
        );
        read_file(context_file)?
    } else {
        verbose_log(config, "No context supplied, rendering with empty context");
        return Ok(serde_json::Value::Null);
    };

    serde_json::from_str(&raw).map_err(|e| format!("Context parse error: {}", e))
}

fn report_error(source: &str, source_name: &str, error: &jinjet::Error, config: &AppConfig) {
    let renderer = DiagnosticRenderer::new(source, source_name, config.color_enabled);
    eprint!("{}", renderer.render(&error.to_diagnostic()));
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn verbose_log(config: &AppConfig, message: &str) {
    if config.verbose {
        eprintln!("[jinjet:debug] {}", message);
    }
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
}
