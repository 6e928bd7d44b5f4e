//! acc8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `acc8-emu run <program>` - Run an ASM, HEX or binary program
//! - `acc8-emu debug <program>` - Interactive debugger
//! - `acc8-emu asm <source>` - Assemble to a program image
//! - `acc8-emu disasm <image>` - Disassemble a program image
//! - `acc8-emu test` - Built-in self-test

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "acc8-emu")]
#[command(version)]
#[command(about = "A cycle-level emulator of an 8-bit accumulator processor")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it traps or hits the instruction limit
    Run {
        /// Path to the program (.asm, .hex or raw binary)
        program: String,
        /// Maximum number of instructions to retire
        #[arg(short, long, default_value = "10000")]
        max_instructions: u64,
        /// Print every retired instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the program to debug
        program: String,
    },
    /// Assemble source to a program image
    Asm {
        /// Path to the source file
        source: String,
        /// Output file (.hex for text, anything else for raw binary)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a program image to readable text
    Disasm {
        /// Path to the program image
        image: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Some(Commands::Run { program, max_instructions, trace, json }) => {
            run_program(&program, max_instructions, trace, json);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("acc8 Emulator v{}", env!("CARGO_PKG_VERSION"));
            println!("An 8-bit accumulator processor, one clock edge at a time");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Load a program or exit with a message.
fn load_or_exit(path: &str) -> Vec<u8> {
    match acc8::load_image(path) {
        Ok(image) if image.is_empty() => {
            eprintln!("❌ {} contains no program bytes", path);
            std::process::exit(1);
        }
        Ok(image) => {
            println!("📂 Loaded {} bytes", image.len());
            image
        }
        Err(e) => {
            eprintln!("❌ Failed to load {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn run_program(path: &str, max_instructions: u64, trace: bool, json: bool) {
    use acc8::{Cpu, CpuState};
    use acc8::asm::disasm::disassemble_at;

    println!("🔧 Running: {}", path);
    let image = load_or_exit(path);

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&image) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    println!();
    println!("━━━ Execution ━━━");

    let mut retired = 0u64;
    while cpu.state == CpuState::Running && retired < max_instructions {
        match cpu.step() {
            Ok(r) => {
                if trace {
                    println!(
                        "{:04X}: {:<12} A={:02X} X={:02X} Y={:02X} SP={:02X} P={}  [{} cyc]",
                        r.pc,
                        disassemble_at(&image, r.pc).text,
                        r.regs.acc,
                        r.regs.x,
                        r.regs.y,
                        r.regs.sp,
                        acc8::Flags::from_bits(r.regs.flags),
                        r.cycles
                    );
                }
                retired += 1;
            }
            Err(e) => {
                eprintln!("❌ CPU error at PC={:04X}: {}", cpu.regs.pc(), e);
                std::process::exit(1);
            }
        }
    }

    if json {
        let report = serde_json::json!({
            "state": cpu.state,
            "instructions": cpu.instructions,
            "cycles": cpu.cycles,
            "registers": cpu.regs.snapshot(),
        });
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Instructions: {}", cpu.instructions);
    println!("Cycles:       {}", cpu.cycles);
    println!("State:        {:?}", cpu.state);
    println!("Registers:    {:?}", cpu.regs);

    if cpu.state == CpuState::Running {
        println!();
        println!("⚠️  Reached instruction limit ({}). Use --max-instructions to increase.", max_instructions);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use acc8::tui::run_debugger;

    println!("🔍 Loading: {}", path);
    let image = load_or_exit(path);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(image) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("❌ Built without the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use acc8::{assemble, save_image};

    let out_path = output.unwrap_or_else(|| {
        std::path::Path::new(source_path).with_extension("hex").to_string_lossy().into_owned()
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let image = match assemble(&source) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} bytes", image.len());

    if let Err(e) = save_image(&out_path, &image) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(path: &str) {
    use acc8::disassemble;

    println!("📖 Disassembling: {}", path);
    println!();

    let image = load_or_exit(path);
    println!("{}", disassemble(&image));
}

fn run_self_test() {
    use acc8::{assemble, Cpu, RunOutcome};
    use acc8::alu::{arith, AluOp, AluRequest, ArithmeticUnit, Flags};

    println!("━━━ acc8 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool, detail: String| {
        print!("{}... ", name);
        if ok {
            println!("✓");
            passed += 1;
        } else {
            println!("✗ ({})", detail);
            failed += 1;
        }
    };

    // ALU
    let (sum, flags) = arith::add(0xFF, 0x01, Flags::empty());
    check("ADD wraps with carry", sum == 0 && flags.carry() && flags.zero(), format!("{:02X} {}", sum, flags));

    let (q, r) = arith::divide(100, 7);
    check("Restoring division", q == 14 && r == 2, format!("{} r {}", q, r));

    check("Integer square root", arith::isqrt(200) == 14, format!("{}", arith::isqrt(200)));

    let mut alu = ArithmeticUnit::new();
    alu.clock(Some(AluRequest::new(AluOp::Div, 10, 0)), Flags::empty());
    let mut edges = 1;
    while !alu.done() && edges < 32 {
        alu.clock(None, Flags::empty());
        edges += 1;
    }
    check(
        "DIV by zero takes 9 edges",
        edges == 9 && alu.result() == 0xFF && alu.flags().overflow(),
        format!("{} edges, {:02X}", edges, alu.result()),
    );

    // CPU
    let program = "LDA #$0A\nADD #$05\nSTA $10\nhalt: BRA halt";
    let outcome = assemble(program).ok().and_then(|image| {
        let mut cpu = Cpu::new();
        cpu.load_program(&image).ok()?;
        let outcome = cpu.run(100).ok()?;
        Some((outcome, cpu.regs.acc(), acc8::Memory::read(&cpu.bus, 0x0210)))
    });
    check(
        "CPU load/add/store",
        outcome == Some((RunOutcome::Trapped { pc: 6 }, 0x0F, 0x0F)),
        format!("{:?}", outcome),
    );

    let program = "loop: JSR bump\nCMP #3\nBNE loop\nhalt: BRA halt\nbump: PHA\nPLA\nINC\nRTS";
    let outcome = assemble(program).ok().and_then(|image| {
        let mut cpu = Cpu::new();
        cpu.load_program(&image).ok()?;
        let outcome = cpu.run(100).ok()?;
        Some((outcome, cpu.regs.acc(), cpu.regs.sp()))
    });
    check(
        "JSR/RTS and stack",
        matches!(outcome, Some((RunOutcome::Trapped { .. }, 3, 0xFF))),
        format!("{:?}", outcome),
    );

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
