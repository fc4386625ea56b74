use ascii_table::{Align, AsciiTable};
use std::env;
use std::fmt::Display;
use tracing_subscriber::EnvFilter;
use verarith::{
    Accumulator, ArithError, Format, RoundingContext, RoundingMode, TrapTable, directed,
};

fn setup_logger() {
    let env = env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "warn".to_owned());
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(env))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// `x*y` is a product, a bare `x` is the term `x*1`
fn parse_term(s: &str) -> Result<(f64, f64), String> {
    let parse = |t: &str| {
        t.trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid number: {}", t))
    };
    match s.split_once('*') {
        Some((x, y)) => Ok((parse(x)?, parse(y)?)),
        None => Ok((parse(s)?, 1.0)),
    }
}

fn naive_sum(terms: &[(f64, f64)], mode: RoundingMode) -> f64 {
    terms.iter().fold(0.0, |sum, &(x, y)| {
        let product = directed::mul(x, y, mode).value;
        directed::add(sum, product, mode).value
    })
}

fn exact_sum(
    ctx: &mut RoundingContext,
    terms: &[(f64, f64)],
) -> Result<Accumulator, ArithError> {
    let mut accu = Accumulator::new();
    for &(x, y) in terms {
        ctx.accumulate(&mut accu, x, y)?;
    }
    Ok(accu)
}

fn display_table(ctx: &mut RoundingContext, terms: &[(f64, f64)], accu: &Accumulator) {
    let mut data: Vec<Vec<String>> = Vec::new();
    for mode in RoundingMode::ALL {
        let naive = naive_sum(terms, mode);
        let exact = ctx
            .with_mode(mode, |ctx| ctx.round_accumulator(accu))
            .map(|x| format!("{:e}", x))
            .unwrap_or_else(|e| format!("error: {}", e));
        data.push(vec![mode.name().to_string(), format!("{:e}", naive), exact]);
    }

    let mut table = AsciiTable::default();
    table.set_max_width(120);
    table.column(0).set_header("Mode").set_align(Align::Left);
    table.column(1).set_header("Naive sum").set_align(Align::Right);
    table.column(2).set_header("Exact dot").set_align(Align::Right);
    let display_data: Vec<Vec<&dyn Display>> = data
        .iter()
        .map(|row| row.iter().map(|cell| cell as &dyn Display).collect())
        .collect();

    println!();
    table.print(display_data);
}

fn main() {
    setup_logger();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <x*y>...", args[0]);
        eprintln!("Example: {} 1e20*1 1*1 -1e20*1", args[0]);
        std::process::exit(1);
    }

    let terms: Vec<(f64, f64)> = args[1..]
        .iter()
        .map(|s| parse_term(s))
        .collect::<Result<_, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error parsing terms: {}", e);
            std::process::exit(1);
        });

    let mut ctx = RoundingContext::builder().traps(TrapTable::default()).build();
    let accu = exact_sum(&mut ctx, &terms).unwrap_or_else(|e| {
        eprintln!("Error accumulating: {}", e);
        std::process::exit(1);
    });

    println!("Accumulated {} products:", terms.len());
    display_table(&mut ctx, &terms, &accu);

    let (lo, hi) = accu.result_interval();
    println!("\nExact value: {}", accu.format(&Format::scientific(0, 30)));
    if lo == hi {
        println!("Enclosure: {}", lo);
    } else {
        println!("Enclosure: [{}, {}]", lo, hi);
    }
    if !ctx.flags().is_empty() {
        println!("Flags: {:?}", ctx.flags());
    }
}
