use clap::{Arg, ArgMatches, Command};
use color_eyre::eyre::{eyre, Result};
use fsmtool::dot::save_dot;
use fsmtool::fa::FA;
use fsmtool::{
    read_canvas, to_rpn, try_eliminate, try_subset_construct, write_canvas, Canvas, CanvasSize,
    FAData, SubsetOptions,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn input_arg() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .help("The .fsmjson canvas backup to read")
        .value_name("INPUT CANVAS FILE")
        .value_parser(clap::value_parser!(PathBuf))
        .required(true)
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .help("Where to write the transformed canvas. Defaults to <input stem>.out.fsmjson next to the input")
        .value_name("OUTPUT CANVAS FILE")
        .value_parser(clap::value_parser!(PathBuf))
}

fn cli() -> Command {
    Command::new("fsmtool")
        .version("2.0")
        .about("Transforms for hand drawn finite state machines: state elimination, subset construction and label parsing")
        .subcommand_required(true)
        .arg(
            Arg::new("width")
                .long("width")
                .help("Width of the canvas new states are placed on")
                .value_parser(clap::value_parser!(f64))
                .default_value("800")
                .global(true),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .help("Height of the canvas new states are placed on")
                .value_parser(clap::value_parser!(f64))
                .default_value("600")
                .global(true),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed for the placement of new states, for reproducible layouts")
                .value_parser(clap::value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("dot")
                .long("dot")
                .help("Also write a Graphviz rendering of the resulting automaton")
                .value_name("DOT FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(
            Command::new("subset")
                .about("Replace the automaton with an equivalent DFA")
                .arg(input_arg())
                .arg(output_arg())
                .arg(
                    Arg::new("no-minimize")
                        .long("no-minimize")
                        .help("Keep every subset as its own state instead of merging equivalent ones")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("eliminate")
                .about("Eliminate a state that is neither starting nor accepting")
                .arg(input_arg())
                .arg(output_arg())
                .arg(
                    Arg::new("state")
                        .short('s')
                        .long("state")
                        .help("Name of the state to eliminate, or #<index> to pick it by position")
                        .value_name("STATE")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Describe the automaton drawn on a canvas")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("rpn")
                .about("Print a transition label in reverse polish notation")
                .arg(
                    Arg::new("expr")
                        .help("The label expression")
                        .value_name("EXPR")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("accepts")
                .about("Run the automaton over a word given as a list of labels")
                .arg(input_arg())
                .arg(
                    Arg::new("word")
                        .help("Labels of the word, in order")
                        .value_name("LABEL")
                        .num_args(0..),
                ),
        )
}

fn default_output(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| eyre!("Cannot derive an output name from {}", input.display()))?;
    Ok(input.with_file_name(format!("{stem}.out.fsmjson")))
}

/// Resolve a state given by name or by `#index`.
fn resolve_state(canvas: &Canvas, state: &str) -> Result<usize> {
    if let Some(index) = state.strip_prefix('#') {
        let index: usize = index.parse()?;
        if index < canvas.nodes.len() {
            return Ok(index);
        }
        return Err(eyre!("There is no state #{}", index));
    }
    canvas
        .find_node(state)
        .ok_or_else(|| eyre!("There is no state named {}", state))
}

fn canvas_size(args: &ArgMatches) -> CanvasSize {
    let defaults = CanvasSize::default();
    CanvasSize {
        width: args.get_one::<f64>("width").copied().unwrap_or(defaults.width),
        height: args.get_one::<f64>("height").copied().unwrap_or(defaults.height),
    }
}

fn rng(args: &ArgMatches) -> fastrand::Rng {
    match args.get_one::<u64>("seed") {
        Some(seed) => fastrand::Rng::with_seed(*seed),
        None => fastrand::Rng::new(),
    }
}

fn input_path(args: &ArgMatches) -> Result<&PathBuf> {
    args.get_one::<PathBuf>("input")
        .ok_or_else(|| eyre!("Input canvas file not provided!"))
}

fn save_result(args: &ArgMatches, canvas: &Canvas) -> Result<()> {
    let out_file_path = match args.get_one::<PathBuf>("output") {
        Some(file_path) => file_path.clone(),
        None => default_output(input_path(args)?)?,
    };
    write_canvas(&out_file_path, canvas)?;
    info!("wrote {}", out_file_path.display());

    if let Some(dot_file_path) = args.get_one::<PathBuf>("dot") {
        save_dot(&FAData::from_canvas(canvas), dot_file_path)?;
    }
    Ok(())
}

fn run_subset(args: &ArgMatches) -> Result<()> {
    let mut canvas = read_canvas(input_path(args)?)?;

    let options = SubsetOptions {
        bounds: canvas_size(args),
        minimize: !args.get_flag("no-minimize"),
    };
    try_subset_construct(&mut canvas, options, &mut rng(args))?;

    println!("DFA has {} states", canvas.nodes.len());
    save_result(args, &canvas)
}

fn run_eliminate(args: &ArgMatches) -> Result<()> {
    let mut canvas = read_canvas(input_path(args)?)?;

    let state = args
        .get_one::<String>("state")
        .ok_or_else(|| eyre!("No state to eliminate was given!"))?;
    let node_id = resolve_state(&canvas, state)?;

    let diagnostics = try_eliminate(&mut canvas, node_id)?;
    for diagnostic in diagnostics {
        warn!("{}", diagnostic);
    }

    println!("Eliminated {}, {} links remain", state, canvas.links.len());
    save_result(args, &canvas)
}

fn run_info(args: &ArgMatches) -> Result<()> {
    let canvas = read_canvas(input_path(args)?)?;
    let fa = FAData::from_canvas(&canvas);

    for state in 0..fa.get_num_states() {
        let start = if fa.get_start_state() == Some(state) {
            "start "
        } else {
            ""
        };
        let accepting = if fa.is_accepting(state) {
            "accepting "
        } else {
            ""
        };
        println!("#{} {}{}{}", state, start, accepting, fa.get_state_name(state));

        for (symbol, target) in fa.get_state_transitions(state) {
            println!("    {} -> {}", symbol, fa.get_state_name(*target));
        }
    }
    println!("deterministic: {}", fa.is_deterministic());

    if let Some(dot_file_path) = args.get_one::<PathBuf>("dot") {
        save_dot(&fa, dot_file_path)?;
    }
    Ok(())
}

fn run_rpn(args: &ArgMatches) -> Result<()> {
    let expr = args
        .get_one::<String>("expr")
        .ok_or_else(|| eyre!("No expression given!"))?;

    let rpn = to_rpn(expr);
    println!("{}", rpn);
    rpn.into_result()?;
    Ok(())
}

fn run_accepts(args: &ArgMatches) -> Result<()> {
    let canvas = read_canvas(input_path(args)?)?;
    let fa = FAData::from_canvas(&canvas);

    let word: Vec<&str> = args
        .get_many::<String>("word")
        .map(|labels| labels.map(String::as_str).collect())
        .unwrap_or_default();

    if fa.accepts(&word) {
        println!("accepted");
    } else {
        println!("rejected");
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli().get_matches();

    match args.subcommand() {
        Some(("subset", sub_args)) => run_subset(sub_args),
        Some(("eliminate", sub_args)) => run_eliminate(sub_args),
        Some(("info", sub_args)) => run_info(sub_args),
        Some(("rpn", sub_args)) => run_rpn(sub_args),
        Some(("accepts", sub_args)) => run_accepts(sub_args),
        _ => Err(eyre!("Unknown command, see --help")),
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use fsmtool::elements::{Point, StateNode};

    #[test]
    fn test_cli_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_default_output() {
        let output = default_output(Path::new("drawings/nfa.fsmjson")).unwrap();
        assert_eq!(output, PathBuf::from("drawings/nfa.out.fsmjson"));
    }

    #[test]
    fn test_resolve_state() {
        let mut canvas = Canvas::new();
        canvas.add_node(StateNode::new("q0", Point { x: 0.0, y: 0.0 }, false));
        canvas.add_node(StateNode::new("q1", Point { x: 0.0, y: 0.0 }, false));

        assert_eq!(resolve_state(&canvas, "q1").unwrap(), 1);
        assert_eq!(resolve_state(&canvas, "#0").unwrap(), 0);
        assert!(resolve_state(&canvas, "#2").is_err());
        assert!(resolve_state(&canvas, "q7").is_err());
    }

    #[test]
    fn test_global_options() {
        let args = cli()
            .try_get_matches_from(["fsmtool", "subset", "-i", "a.fsmjson", "--seed", "4", "--width", "400"])
            .unwrap();
        let (name, sub_args) = args.subcommand().unwrap();

        assert_eq!(name, "subset");
        assert_eq!(canvas_size(sub_args).width, 400.0);
        assert_eq!(canvas_size(sub_args).height, 600.0);
        assert_eq!(sub_args.get_one::<u64>("seed"), Some(&4));
        assert!(!sub_args.get_flag("no-minimize"));
    }
}
