use reftrace::{AnalysisVerbose, FrameSummary, TraceMetrics};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            self.wrap(s, color)
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            self.wrap(s, BOLD)
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            self.wrap(s, DIM)
        }

        fn wrap(&self, s: impl AsRef<str>, code: &str) -> String {
            if self.enabled { format!("{}{}{}", code, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

const MAX_FRAMES: usize = 20;

pub fn print_run(source: &str, res: &AnalysisVerbose, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Tracing: {source}"), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Input accesses ━━━", ansi::GRAY));
    if res.accesses.is_empty() {
        println!("{}", palette.dim("  No input paths read on successful derivations"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • Every frame that read input failed");
        println!("  • Paths contained variables with no value in the event locals");
        println!("  • The trace ended before child frames returned to the root");
    } else {
        for path in &res.accesses {
            println!("  {}", palette.paint(path, ansi::GREEN));
        }
    }

    if !res.details.returns.is_empty() {
        println!("\n{}", palette.paint("━━━ Rule values ━━━", ansi::GRAY));
        for ret in &res.details.returns {
            println!(
                "  {} {} {}",
                palette.paint(ret.rule.as_str(), ansi::CYAN),
                palette.dim("←"),
                palette.paint(ret.locations().join(", "), ansi::GREEN)
            );
        }
    }

    println!("\n{}", palette.paint("━━━ Frames ━━━", ansi::GRAY));
    print_frames(&res.details.frames, &palette);

    println!("\n{}", palette.paint("━━━ Metrics ━━━", ansi::GRAY));
    print_metrics(&res.details.metrics, &palette);

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!("  Total: {}", palette.paint(format!("{:?}", res.elapsed), ansi::GREEN));
    println!();
}

fn print_frames(frames: &[FrameSummary], palette: &ansi::Palette) {
    if frames.is_empty() {
        println!("{}", palette.dim("  No frames"));
        return;
    }
    for frame in frames.iter().take(MAX_FRAMES) {
        println!("  {}", fmt_frame_compact(frame, palette));
        for path in &frame.accesses {
            println!("      {}", palette.dim(path));
        }
    }
    if frames.len() > MAX_FRAMES {
        println!("  {}", palette.dim(format!("... +{} more", frames.len() - MAX_FRAMES)));
    }
}

fn print_metrics(metrics: &TraceMetrics, palette: &ansi::Palette) {
    println!(
        "  Events: {}  │  Frames: {} pushed, {} popped  │  Max depth: {}",
        palette.paint(metrics.events.to_string(), ansi::BLUE),
        palette.paint(metrics.frames_pushed.to_string(), ansi::BLUE),
        palette.paint(metrics.frames_popped.to_string(), ansi::BLUE),
        palette.paint(metrics.max_depth.to_string(), ansi::BLUE),
    );
    println!(
        "  Failed discarded: {}  │  Orphaned events: {}  │  Breakpoint hits: {}",
        palette.paint(metrics.failed_discarded.to_string(), ansi::YELLOW),
        palette.paint(metrics.orphaned_events.to_string(), ansi::YELLOW),
        palette.paint(metrics.breakpoint_hits.to_string(), ansi::CYAN),
    );
}

fn fmt_frame_compact(frame: &FrameSummary, palette: &ansi::Palette) -> String {
    let status =
        if frame.failed { palette.paint("✗ failed", ansi::RED) } else { palette.paint("✓", ansi::GREEN) };
    let rule = frame.rule.as_deref().unwrap_or("<query>");
    format!(
        "{} {} {} {} {}",
        palette.paint(format!("#{}←{}", frame.query_id, frame.parent_id), ansi::YELLOW),
        palette.paint(rule, ansi::BLUE),
        status,
        palette.dim(format!("│ vars: {}  accesses: {}", frame.tracked_vars, frame.accesses.len())),
        if frame.returns.is_empty() { String::new() } else { palette.dim(format!("│ value ← {}", frame.returns.join(", "))) },
    )
}
