use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("feedgen")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Feedgen Contributors")
        .about("Generate feeds from web pages and trackers")
        .arg(
            clap::arg!(-f --feed <FEED> "Feed to build")
                .default_value("all")
                .value_parser(["all", "css", "rss", "h1", "p0", "p0rca", "syzbot"]),
        )
        .arg(
            clap::arg!(-t --format <FORMAT> "Output format")
                .default_value("rss")
                .value_parser(["rss", "atom", "json"]),
        )
        .arg(
            clap::arg!(-o --output <FILE> "Output file for a single feed")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(--"output-dir" <DIR> "Directory feeds are written to")
                .default_value("./rss_output")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(-w --workdir <DIR> "Directory holding per-source reconciliation state")
                .default_value("./workdir")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(-c --config <FILE> "Source configuration file (required for css and rss)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            clap::arg!(--"config-dir" <DIR> "Directory scanned for *.json source configurations")
                .default_value("./configs")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("15"))
        .arg(clap::arg!(--"user-agent" <UA> "Custom User-Agent for HTTP requests"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    for shell in [
        clap_complete::Shell::Bash,
        clap_complete::Shell::Zsh,
        clap_complete::Shell::Fish,
        clap_complete::Shell::PowerShell,
    ] {
        clap_complete::generate_to(shell, &mut cmd, "feedgen", &completions_dir).unwrap();
    }

    println!("cargo:warning=Shell completions generated in: {}", completions_dir.display());
}
