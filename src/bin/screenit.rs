//! Screenit CLI - компилятор и интерактивная оболочка.
//!
//! Использование:
//!   screenit                 - запустить REPL
//!   screenit <file.sit>      - скомпилировать и выполнить файл
//!   screenit -e "source"     - скомпилировать и выполнить строку
//!   screenit --help          - справка

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use screenit_lang::ast::{dump, Stmt};
use screenit_lang::compiler::{compile_source, Compilation, CompileOptions};
use screenit_lang::error::{ScreenitError, ScreenitResult};
use screenit_lang::llvm_backend;
use screenit_lang::parser::{parse, tokenize};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str = r#"
Screenit - a small imperative language compiled to SSA IR

USAGE:
    screenit                     Start REPL (interactive mode)
    screenit <file.sit>          Compile and run a file
    screenit -e "<source>"       Compile and run source text
    screenit --help, -h          Show this help
    screenit --version, -v       Show version

OPTIONS:
    --tokens                     Print the token stream instead of running
    --ast                        Print the AST debug dump instead of running
    --ast-json                   Print the AST as JSON instead of running
    --emit-ir                    Print the generated IR instead of running
    -o <path>                    Write IR to <path> (an object file if it ends in .o)

Without the 'llvm_backend' feature programs cannot be executed; the IR is
printed instead.

REPL COMMANDS:
    :help, :h                Show help
    :quit, :q, :exit         Exit REPL
    :clear, :c               Clear screen
    :reset, :r               Forget defined functions
    :load <file>             Compile and run a file
    :source, :s              Show defined functions
    :tokens <source>         Show tokens
    :ast <source>            Show AST
    :ir <source>             Show IR (with defined functions)

Functions entered in the REPL are kept for later lines; variables are not.

EXAMPLES:
    screenit -e "screenit 1 + 2;"
    screenit --emit-ir demos/fib.sit
    screenit

SYNTAX:
    var x = 42;                          // Variable declaration
    x = x + 1;                           // Assignment
    screenit x;                          // Print
    if (x > 1) { screenit x; } else { screenit 0; }
    while (x > 0) { x = x - 1; }
    for (var i = 0; i < 3; i = i + 1) { screenit i; }
    func add(a, b) { return a + b; }     // Function definition
    screenit add(1, 2);                  // Function call
"#;

/// Что сделать с программой.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Run,
    Tokens,
    Ast,
    AstJson,
    EmitIr,
}

/// Откуда взять исходник.
#[derive(Debug)]
enum Input {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug)]
struct Cli {
    action: Action,
    input: Option<Input>,
    output: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(Some(cli)) => cli,
        Ok(None) => return,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("Use --help for usage information.");
            process::exit(1);
        }
    };

    let Some(input) = cli.input else {
        if cli.action != Action::Run || cli.output.is_some() {
            eprintln!("No input given.");
            eprintln!("Use --help for usage information.");
            process::exit(1);
        }
        run_repl();
        return;
    };

    match execute(cli.action, &input, cli.output.as_deref()) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Разобрать аргументы командной строки. `Ok(None)`, если запрос уже
/// обработан (`--help`, `--version`).
fn parse_args(args: &[String]) -> Result<Option<Cli>, String> {
    let mut cli = Cli {
        action: Action::Run,
        input: None,
        output: None,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("{}", HELP);
                return Ok(None);
            }
            "--version" | "-v" => {
                println!("Screenit {}", VERSION);
                return Ok(None);
            }
            "--tokens" => cli.action = Action::Tokens,
            "--ast" => cli.action = Action::Ast,
            "--ast-json" => cli.action = Action::AstJson,
            "--emit-ir" => cli.action = Action::EmitIr,
            "-o" | "--output" => {
                let path = iter.next().ok_or("Option -o requires a path.")?;
                cli.output = Some(PathBuf::from(path));
            }
            "-e" | "--eval" => {
                let source = iter.next().ok_or("Option -e requires source text.")?;
                set_input(&mut cli, Input::Inline(source.clone()))?;
            }
            option if option.starts_with('-') => {
                return Err(format!("Unknown option: {}", option));
            }
            file => set_input(&mut cli, Input::File(PathBuf::from(file)))?,
        }
    }

    Ok(Some(cli))
}

fn set_input(cli: &mut Cli, input: Input) -> Result<(), String> {
    if cli.input.is_some() {
        return Err("Only one input (file or -e) may be given.".to_string());
    }
    cli.input = Some(input);
    Ok(())
}

/// Выполнить действие над входом и вернуть код завершения процесса.
fn execute(action: Action, input: &Input, output: Option<&Path>) -> ScreenitResult<i32> {
    let source = match input {
        Input::File(path) => String::from_utf8_lossy(&fs::read(path)?).into_owned(),
        Input::Inline(source) => source.clone(),
    };

    match action {
        Action::Tokens => {
            for token in tokenize(&source) {
                println!("{}", token);
            }
            return Ok(0);
        }
        Action::Ast => {
            println!("{}", dump(&parse(&source)?));
            return Ok(0);
        }
        Action::AstJson => {
            println!("{}", serde_json::to_string_pretty(&parse(&source)?)?);
            return Ok(0);
        }
        Action::Run | Action::EmitIr => {}
    }

    let compilation = compile_source(&source, &CompileOptions::default())?;

    if let Some(path) = output {
        write_output(&compilation, path)?;
        if action == Action::Run {
            return Ok(0);
        }
    }

    if action == Action::EmitIr || !llvm_backend::is_available() {
        if action == Action::Run {
            eprintln!("LLVM support not compiled in; printing IR instead.");
        }
        print!("{}", compilation.module);
        return Ok(0);
    }

    llvm_backend::execute(&compilation.module)
}

fn write_output(compilation: &Compilation, path: &Path) -> ScreenitResult<()> {
    if path.extension().is_some_and(|ext| ext == "o") {
        return llvm_backend::write_object(&compilation.module, path);
    }
    fs::write(path, compilation.module.to_string())?;
    Ok(())
}

/// Запустить REPL.
fn run_repl() {
    println!("Screenit {}", VERSION);
    println!("Type :help for commands, :quit to exit.\n");

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Failed to initialize readline: {}", e);
            process::exit(1);
        }
    };

    // Определения функций, накопленные за сессию
    let mut definitions = String::new();
    let history_path = dirs_next::data_dir()
        .map(|p| p.join("screenit").join("history.txt"))
        .unwrap_or_else(|| PathBuf::from(".screenit_history"));

    // Загрузить историю
    let _ = rl.load_history(&history_path);

    loop {
        let readline = rl.readline("screenit> ");

        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                // Добавить в историю
                let _ = rl.add_history_entry(line);

                // Обработать команды REPL
                if line.starts_with(':') {
                    match handle_command(line, &definitions) {
                        CommandResult::Continue => continue,
                        CommandResult::Exit => break,
                        CommandResult::Reset => {
                            definitions.clear();
                            println!("Definitions cleared.");
                            continue;
                        }
                    }
                }

                execute_line(line, &mut definitions);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    // Сохранить историю
    if let Some(parent) = history_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&history_path);
}

enum CommandResult {
    Continue,
    Exit,
    Reset,
}

fn handle_command(cmd: &str, definitions: &str) -> CommandResult {
    let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
    let command = parts[0];
    let arg = parts.get(1).map(|s| s.trim());

    match command {
        ":help" | ":h" => {
            println!("{}", HELP);
            CommandResult::Continue
        }
        ":quit" | ":q" | ":exit" => CommandResult::Exit,
        ":clear" | ":c" => {
            print!("\x1B[2J\x1B[1;1H"); // ANSI clear screen
            CommandResult::Continue
        }
        ":reset" | ":r" => CommandResult::Reset,
        ":load" | ":l" => {
            match arg {
                Some(path) => report(execute(Action::Run, &Input::File(PathBuf::from(path)), None)),
                None => println!("Usage: :load <file.sit>"),
            }
            CommandResult::Continue
        }
        ":source" | ":s" => {
            if definitions.is_empty() {
                println!("No functions defined.");
            } else {
                println!("{}", definitions.trim_end());
            }
            CommandResult::Continue
        }
        ":tokens" => {
            match arg {
                Some(source) => report(execute(Action::Tokens, &Input::Inline(source.to_string()), None)),
                None => println!("Usage: :tokens <source>"),
            }
            CommandResult::Continue
        }
        ":ast" => {
            match arg {
                Some(source) => report(execute(Action::Ast, &Input::Inline(source.to_string()), None)),
                None => println!("Usage: :ast <source>"),
            }
            CommandResult::Continue
        }
        ":ir" => {
            match arg {
                Some(source) => {
                    let program = format!("{}{}", definitions, source);
                    report(execute(Action::EmitIr, &Input::Inline(program), None));
                }
                None => println!("Usage: :ir <source>"),
            }
            CommandResult::Continue
        }
        _ => {
            println!("Unknown command: {}", command);
            println!("Type :help for available commands.");
            CommandResult::Continue
        }
    }
}

/// Скомпилировать строку вместе с накопленными функциями и выполнить.
/// Строка, состоящая только из определений функций, запоминается.
fn execute_line(line: &str, definitions: &mut String) {
    let statements = match parse(line) {
        Ok(statements) => statements,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    let program = format!("{}{}\n", definitions, line);
    let only_functions = !statements.is_empty()
        && statements.iter().all(|s| matches!(s, Stmt::Function(_)));

    if only_functions {
        match compile_source(&program, &CompileOptions::default()) {
            Ok(_) => {
                definitions.push_str(line);
                definitions.push('\n');
                println!("Defined {} function(s).", statements.len());
            }
            Err(e) => eprintln!("{}", e),
        }
        return;
    }

    report(execute(Action::Run, &Input::Inline(program), None));
}

fn report(result: ScreenitResult<i32>) {
    match result {
        Ok(0) => {}
        Ok(code) => println!("=> {}", code),
        Err(ScreenitError::Io(e)) => eprintln!("IO error: {}", e),
        Err(e) => eprintln!("{}", e),
    }
}
