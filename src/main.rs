mod binaries;
mod machine;
mod twofs;
mod util;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::exit;

use clap::{Parser, Subcommand};
use itertools::Itertools;
use log::{debug, error};

use crate::binaries::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::machine::{Machine, DEFAULT_DISK, DEFAULT_DISK_SIZE};
use crate::twofs::fs::AddressSize;
use crate::twofs::twofs::TwoFsFilesystem;

/// Two-level 8.3 filesystem kept in a single disk image.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
  /// Machine description (YAML) naming the disk image
  #[clap(short, long)]
  machine: Option<String>,

  /// Disk image to use instead of the one in the machine description
  #[clap(short, long)]
  disk: Option<String>,

  /// More logging (-v info, -vv debug)
  #[clap(short, long, parse(from_occurrences))]
  verbose: usize,

  #[clap(subcommand)]
  command: Option<Command>,
}

/// One shell line, parsed with the same grammar as the command line.
#[derive(Parser, Debug)]
#[clap(no_binary_name = true)]
struct ShellLine {
  #[clap(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Format the disk image
  Mkfs {
    /// Image size in bytes (whole blocks)
    #[clap(long)]
    size: Option<AddressSize>,
  },
  /// List the root or a directory
  Ls {
    #[clap(default_value = "/")]
    pathname: String,
  },
  /// Show attributes of a path
  Stat { pathname: String },
  /// Create a directory under the root
  Mkdir { pathname: String },
  /// Create an empty NAME.EXT file
  Touch { pathname: String },
  /// Print file contents
  Cat {
    pathname: String,
    #[clap(long, default_value_t = 0)]
    offset: u64,
    #[clap(long)]
    count: Option<usize>,
  },
  /// Write text at an offset (at most the current size)
  Write {
    pathname: String,
    text: String,
    #[clap(long, default_value_t = 0)]
    offset: u64,
  },
  /// Write text at the end of a file
  Append { pathname: String, text: String },
  /// SHA-256 of file contents
  Sum { pathname: String },
  /// Accepted, but nothing is removed
  Rm { pathname: String },
  /// Accepted, but nothing is removed
  Rmdir { pathname: String },
  /// Accepted, but the size does not change
  Truncate { pathname: String, size: u64 },
  /// Disk usage
  Df,
  /// Hex dump of the raw block at a byte address
  Dump { address: AddressSize },
  /// Interactive shell
  Shell,
}

fn init_logger(verbose: usize) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };

  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
    .format(|buf, record| {
      writeln!(
        buf,
        "{} {:<5} {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        record.level(),
        record.args()
      )
    })
    .init();
}

fn load_machine(cli: &Cli) -> Result<Machine, String> {
  let machine = match &cli.machine {
    Some(machine_schema_path) => Some(Machine::new(machine_schema_path).map_err(|error| error.to_string())?),
    None if Path::new("machine.yaml").exists() => {
      Some(Machine::new("machine.yaml").map_err(|error| error.to_string())?)
    },
    None => None,
  };

  let (disk, size): (&str, AddressSize) = match (&cli.disk, machine) {
    (Some(disk), machine) => (disk.as_str(), machine.as_ref().map_or(DEFAULT_DISK_SIZE, Machine::disk_size)),
    (None, Some(machine)) => return Ok(machine),
    (None, None) => (DEFAULT_DISK, DEFAULT_DISK_SIZE),
  };

  Machine::with_disk(disk, size).map_err(|error| error.to_string())
}

fn mkfs(machine: &Machine, size: Option<AddressSize>) -> Result<TwoFsFilesystem, i32> {
  match TwoFsFilesystem::mkfs(machine.disk(), size.unwrap_or_else(|| machine.disk_size())) {
    Ok(fs) => {
      println!("formatted {}", machine.disk().display());
      Ok(fs)
    },
    Err(errno) => {
      eprintln!("mkfs: {}: {errno}", machine.disk().display());
      Err(errno.code())
    },
  }
}

fn execute(fs: &mut TwoFsFilesystem, machine: &Machine, command: Command) -> i32 {
  debug!("twofs: executing {command:?}");

  match command {
    Command::Mkfs { size } => match mkfs(machine, size) {
      Ok(formatted) => {
        *fs = formatted;
        EXIT_SUCCESS
      },
      Err(status) => status,
    },
    Command::Ls { pathname } => binaries::ls(fs, &pathname),
    Command::Stat { pathname } => binaries::stat(fs, &pathname),
    Command::Mkdir { pathname } => binaries::mkdir(fs, &pathname),
    Command::Touch { pathname } => binaries::touch(fs, &pathname),
    Command::Cat { pathname, offset, count } => binaries::cat(fs, &pathname, offset, count),
    Command::Write { pathname, text, offset } => binaries::write(fs, &pathname, text.as_bytes(), offset),
    Command::Append { pathname, text } => binaries::append(fs, &pathname, text.as_bytes()),
    Command::Sum { pathname } => binaries::sum(fs, &pathname),
    Command::Rm { pathname } => binaries::rm(fs, &pathname),
    Command::Rmdir { pathname } => binaries::rmdir(fs, &pathname),
    Command::Truncate { pathname, size } => binaries::truncate(fs, &pathname, size),
    Command::Df => binaries::df(fs),
    Command::Dump { address } => binaries::dump(fs, address),
    Command::Shell => {
      eprintln!("shell: already in a shell");
      EXIT_FAILURE
    },
  }
}

fn shell(fs: &mut TwoFsFilesystem, machine: &Machine) -> i32 {
  let stdin = io::stdin();
  let mut status = EXIT_SUCCESS;

  loop {
    print!("# ");
    if io::stdout().flush().is_err() {
      return EXIT_FAILURE;
    }

    let mut command = String::new();
    match stdin.lock().read_line(&mut command) {
      Ok(0) => break,
      Ok(_) => (),
      Err(error) => {
        error!("shell: can't read stdin: {error}");
        return EXIT_FAILURE;
      },
    }

    let args = command.split_whitespace().collect::<Vec<&str>>();
    match args.first() {
      None => continue,
      Some(&"exit") => break,
      Some(&"echo") => {
        println!("{}", args.iter().skip(1).join(" "));
        continue;
      },
      Some(_) => (),
    }

    status = match ShellLine::try_parse_from(args.iter().copied()) {
      Ok(ShellLine { command }) => execute(fs, machine, command),
      Err(error) => {
        // Help and usage errors both print through clap
        let _ = error.print();
        EXIT_FAILURE
      },
    };
  }

  status
}

pub fn main() {
  let cli = Cli::parse();
  init_logger(cli.verbose);

  let machine = match load_machine(&cli) {
    Ok(machine) => machine,
    Err(message) => {
      eprintln!("{message}");
      exit(EXIT_FAILURE);
    },
  };

  // Formatting must not depend on the old image being readable
  if let Some(Command::Mkfs { size }) = cli.command {
    exit(mkfs(&machine, size).map_or_else(|status| status, |_| EXIT_SUCCESS));
  }

  let mut fs = match machine.boot() {
    Ok(fs) => fs,
    Err(errno) => {
      eprintln!("twofs: can't attach {}: {errno}", machine.disk().display());
      exit(errno.code());
    },
  };

  let status = match cli.command {
    None | Some(Command::Shell) => shell(&mut fs, &machine),
    Some(command) => execute(&mut fs, &machine, command),
  };

  exit(status);
}


// vim:ts=2 sw=2
