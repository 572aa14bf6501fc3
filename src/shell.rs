//! Interactive terminal shell
//!
//! Line-oriented front end over an [`ImageHistory`] and a
//! [`RecognitionService`]. Reads commands from any `BufRead` and writes
//! replies to any `Write`, so the same loop drives stdin/stdout and tests.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::history::ImageHistory;
use crate::recognition::{Classifier, RecognitionService};

const HELP: &str = "\
Commands:
  open <path>   load an image and select it
  list          show loaded images (* marks the selection)
  select <n>    select image number n
  recognise     recognise the sign in the selected image
  help          show this message
  quit          leave the shell";

/// One parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    List,
    Select(usize),
    Recognise,
    Help,
    Quit,
    Empty,
}

impl Command {
    /// Parse one input line. Errors carry the message shown to the user.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        match name.to_lowercase().as_str() {
            "" => Ok(Command::Empty),
            "open" | "o" => {
                if arg.is_empty() {
                    Err("usage: open <path>".to_string())
                } else {
                    Ok(Command::Open(arg.to_string()))
                }
            }
            "list" | "ls" => Ok(Command::List),
            "select" | "s" => arg
                .parse::<usize>()
                .map(Command::Select)
                .map_err(|_| "usage: select <n>".to_string()),
            "recognise" | "recognize" | "r" => Ok(Command::Recognise),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}', type 'help'", other)),
        }
    }
}

pub struct Shell<C> {
    service: RecognitionService<C>,
    history: ImageHistory,
    images_directory: Option<PathBuf>,
}

impl<C: Classifier> Shell<C> {
    pub fn new(service: RecognitionService<C>) -> Self {
        Self {
            service,
            history: ImageHistory::new(),
            images_directory: None,
        }
    }

    /// Relative names that do not exist as given are looked up here.
    pub fn with_images_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.images_directory = dir;
        self
    }

    pub fn history(&self) -> &ImageHistory {
        &self.history
    }

    /// Read and execute commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, output: &mut W) -> io::Result<()> {
        writeln!(output, "Road sign recognition. Type 'help' for commands.")?;
        write!(output, "> ")?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let keep_going = match Command::parse(&line) {
                Ok(command) => self.execute(command, output)?,
                Err(message) => {
                    writeln!(output, "{}", message)?;
                    true
                }
            };
            if !keep_going {
                return Ok(());
            }
            write!(output, "> ")?;
            output.flush()?;
        }
        writeln!(output)?;
        Ok(())
    }

    /// Run one command. Returns `false` when the shell should exit.
    pub fn execute<W: Write>(&mut self, command: Command, output: &mut W) -> io::Result<bool> {
        debug!("shell command: {:?}", command);
        match command {
            Command::Empty => {}
            Command::Help => writeln!(output, "{}", HELP)?,
            Command::Quit => return Ok(false),
            Command::Open(name) => self.open(&name, output)?,
            Command::List => self.list(output)?,
            Command::Select(number) => match number.checked_sub(1).and_then(|i| self.history.select(i)) {
                Some(entry) => writeln!(output, "Selected {}", entry.display_name())?,
                None => writeln!(output, "No image number {}", number)?,
            },
            Command::Recognise => self.recognise_selected(output)?,
        }
        Ok(true)
    }

    fn open<W: Write>(&mut self, name: &str, output: &mut W) -> io::Result<()> {
        let path = self.resolve(name);
        match image::open(&path) {
            Ok(image) => {
                info!("Opened {}", path.display());
                let index = self.history.push(path, image);
                if let Some(entry) = self.history.get(index) {
                    writeln!(output, "[{}] {}", index + 1, entry.display_name())?;
                }
            }
            Err(e) => writeln!(output, "Could not open {}: {}", path.display(), e)?,
        }
        Ok(())
    }

    fn list<W: Write>(&self, output: &mut W) -> io::Result<()> {
        if self.history.is_empty() {
            return writeln!(output, "No images loaded");
        }
        let selected = self.history.selected_index();
        for (i, entry) in self.history.iter().enumerate() {
            let mark = if selected == Some(i) { '*' } else { ' ' };
            writeln!(
                output,
                "{} [{}] {} ({}x{})",
                mark,
                i + 1,
                entry.display_name(),
                entry.image.width(),
                entry.image.height()
            )?;
        }
        Ok(())
    }

    fn recognise_selected<W: Write>(&self, output: &mut W) -> io::Result<()> {
        let Some(entry) = self.history.selected() else {
            return writeln!(output, "No image selected, use 'open <path>' first");
        };

        debug!("recognising {}", entry.path.display());
        match self.service.recognise_image(&entry.image) {
            Some(recognition) => writeln!(output, "Recognised sign: {}", recognition.name),
            None => writeln!(output, "Error during recognition"),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        match &self.images_directory {
            Some(dir) if path.is_relative() && !path.exists() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}
