//! Interactive REPL.
//!
//! One [`Vm`] lives for the whole session, so globals and functions defined
//! on earlier lines stay available. Errors are printed and the prompt comes
//! back; Ctrl-C asks before quitting, Ctrl-D quits.

use std::path::PathBuf;

use pythowon_runtime::Vm;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::config::DriverConfig;

const PROMPT: &str = "PythOwOn <<< ";

fn history_path(config: &DriverConfig) -> Option<PathBuf> {
    config
        .history_file
        .clone()
        .or_else(|| home::home_dir().map(|dir| dir.join(".pythowon_history")))
}

pub fn run(config: &DriverConfig) {
    let editor_config = rustyline::Config::builder()
        .max_history_size(config.history_size.unwrap_or(1000))
        .map(|builder| builder.build())
        .unwrap_or_else(|_| rustyline::Config::default());
    let mut editor = match DefaultEditor::with_config(editor_config) {
        Ok(editor) => editor,
        Err(error) => {
            eprintln!("Could not start line editor: {error}");
            std::process::exit(1);
        }
    };

    let history = history_path(config);
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    let mut vm = Vm::new();
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                if let Err(error) = vm.interpret(&line) {
                    eprintln!("{error}");
                }
            }
            Err(ReadlineError::Interrupted) => {
                match editor.readline("Ctrl-C detected, do you want to exit (y/n)? ") {
                    Ok(answer) if answer.trim().eq_ignore_ascii_case("y") => break,
                    Ok(_) => println!("Ok, continuing..."),
                    Err(_) => break,
                }
            }
            Err(ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("Input error: {error}");
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = editor.save_history(path);
    }
}
