// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use thalseg::config::{
    consts, resolve_labels, Algorithm, AtlasLibrary, ExecOptions, FusionStrategy, PipelineConfig,
};
use thalseg::errors::{ExecutionError, PipelineError};
use thalseg::observability::messages::pipeline::PipelineFailed;
use thalseg::observability::messages::StructuredLog;
use thalseg::pipeline::{Driver, Workspace};

fn usage(program: &str) {
    eprintln!(
        "Usage: {} [OPTIONS] -a <v0|v2> <input_image> <label>...",
        program
    );
    eprintln!();
    eprintln!("Segment thalamic nuclei from a WMnMPRAGE image by multi-atlas label fusion.");
    eprintln!();
    eprintln!("Labels: ALL, or one or more of:");
    let names: Vec<&str> = consts::LABEL_CATALOG.iter().map(|(name, _)| *name).collect();
    eprintln!("  {}", names.join(" "));
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -a, --algorithm <v0|v2>   registration pipeline variant (required)");
    eprintln!("      --atlas <dir>         atlas library root (or THALSEG_ATLAS_DIR)");
    eprintln!("  -M, --majorityvoting      fuse by unweighted majority vote");
    eprintln!("      --jointfusion         fuse with the older jointfusion binary");
    eprintln!("  -R, --right               segment the right side (L-R flip)");
    eprintln!("  -F, --forcereg            force template registration even if warps exist");
    eprintln!("  -B, --bigcrop             use the big crop template and mask (v2)");
    eprintln!("  -w, --warp <prefix>       read/write registration transforms at this prefix");
    eprintln!("  -xf <mask>                fixed-image mask for nonlinear registration");
    eprintln!("  -xm <mask>                moving-image mask for nonlinear registration");
    eprintln!("      --template <path>     custom template (v2, requires --mask)");
    eprintln!("      --mask <path>         custom crop mask (v2, requires --template)");
    eprintln!("      --output-path <dir>   output directory (default: input's directory)");
    eprintln!("      --tempdir <dir>       keep intermediate artifacts here (not deleted)");
    eprintln!("  -p, --processes <n>       worker count (default: number of CPUs)");
    eprintln!("  -n, --dry-run             print commands without executing");
    eprintln!("  -v, --verbose             announce each external command");
    eprintln!("  -d, --debug               confirm each command interactively (serial)");
}

fn next_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("option '{}' requires a value", flag))
}

fn parse_args(args: &[String]) -> Result<(PipelineConfig, PathBuf), String> {
    let mut positionals: Vec<String> = Vec::new();
    let mut algorithm: Option<Algorithm> = None;
    let mut atlas_root: Option<PathBuf> = None;
    let mut majority = false;
    let mut legacy_joint = false;
    let mut flip_right = false;
    let mut force_registration = false;
    let mut big_crop = false;
    let mut warp_prefix: Option<PathBuf> = None;
    let mut fixed_image_mask: Option<PathBuf> = None;
    let mut moving_image_mask: Option<PathBuf> = None;
    let mut custom_template: Option<PathBuf> = None;
    let mut custom_mask: Option<PathBuf> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut temp_dir: Option<PathBuf> = None;
    let mut workers: Option<usize> = None;
    let mut dry_run = false;
    let mut verbose = false;
    let mut interactive = false;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].clone();
        match arg.as_str() {
            "-a" | "--algorithm" => {
                let value = next_value(args, &mut i, &arg)?;
                algorithm = Some(
                    Algorithm::parse(&value)
                        .ok_or_else(|| format!("unknown algorithm '{}'", value))?,
                );
            }
            "--atlas" => atlas_root = Some(PathBuf::from(next_value(args, &mut i, &arg)?)),
            "-M" | "--majorityvoting" => majority = true,
            "--jointfusion" => legacy_joint = true,
            "-R" | "--right" => flip_right = true,
            "-F" | "--forcereg" => force_registration = true,
            "-B" | "--bigcrop" => big_crop = true,
            "-w" | "--warp" => warp_prefix = Some(PathBuf::from(next_value(args, &mut i, &arg)?)),
            "-xf" => fixed_image_mask = Some(PathBuf::from(next_value(args, &mut i, &arg)?)),
            "-xm" => moving_image_mask = Some(PathBuf::from(next_value(args, &mut i, &arg)?)),
            "--template" => custom_template = Some(PathBuf::from(next_value(args, &mut i, &arg)?)),
            "--mask" => custom_mask = Some(PathBuf::from(next_value(args, &mut i, &arg)?)),
            "--output-path" => output_dir = Some(PathBuf::from(next_value(args, &mut i, &arg)?)),
            "--tempdir" => temp_dir = Some(PathBuf::from(next_value(args, &mut i, &arg)?)),
            "-p" | "--processes" => {
                let value = next_value(args, &mut i, &arg)?;
                workers = Some(
                    value
                        .parse()
                        .map_err(|_| format!("invalid worker count '{}'", value))?,
                );
            }
            "-n" | "--dry-run" => dry_run = true,
            "-v" | "--verbose" => verbose = true,
            "-d" | "--debug" => interactive = true,
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{}'", other));
            }
            _ => positionals.push(arg),
        }
        i += 1;
    }

    if positionals.len() < 2 {
        return Err("an input image and at least one label are required".to_string());
    }
    let input_image = PathBuf::from(&positionals[0]);
    let labels = resolve_labels(&positionals[1..]).map_err(|err| err.to_string())?;

    let algorithm = algorithm.ok_or("the -a/--algorithm option is required")?;
    let fusion = match (majority, legacy_joint) {
        (true, true) => {
            return Err("only one label fusion strategy can be selected".to_string());
        }
        (true, false) => FusionStrategy::Majority,
        (false, true) => FusionStrategy::Joint,
        (false, false) => FusionStrategy::JointMasked,
    };

    let atlas_root = atlas_root
        .or_else(|| env::var_os("THALSEG_ATLAS_DIR").map(PathBuf::from))
        .ok_or("an atlas library is required (--atlas or THALSEG_ATLAS_DIR)")?;

    let output_dir = output_dir.unwrap_or_else(|| {
        input_image
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    });

    if interactive {
        eprintln!("Debug mode forces serial execution.");
    }

    let config = PipelineConfig {
        input_image,
        output_dir,
        labels,
        algorithm,
        fusion,
        big_crop,
        flip_right,
        force_registration,
        warp_prefix,
        fixed_image_mask,
        moving_image_mask,
        custom_template,
        custom_mask,
        workers,
        temp_dir,
        mask_dilation: consts::DEFAULT_MASK_DILATION,
        exec: ExecOptions {
            echo: dry_run,
            verbose,
            suppress: true,
            interactive,
            env: Vec::new(),
        },
    };
    config.validate()?;
    Ok((config, atlas_root))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args
        .first()
        .cloned()
        .unwrap_or_else(|| "thalseg".to_string());
    let (config, atlas_root) = match parse_args(&args[1..]) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("error: {}", message);
            eprintln!();
            usage(&program);
            std::process::exit(2);
        }
    };

    let atlas = match AtlasLibrary::discover(&atlas_root) {
        Ok(atlas) => atlas,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, terminating in-flight work");
                cancel.cancel();
            }
        });
    }

    let workspace = match Workspace::create(config.temp_dir.as_deref(), &config.output_dir) {
        Ok(workspace) => workspace,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    };
    tracing::info!(
        workspace = %workspace.root().display(),
        workers = config.effective_workers(),
        "Running with {} workers",
        config.effective_workers()
    );

    let driver = Driver::new(config, atlas, cancel);
    let result = driver.run(&workspace).await;
    // Throwaway workspaces are removed whether the run succeeded or not;
    // retained ones stay for resuming and post-mortem inspection.
    drop(workspace);

    match result {
        Ok(outputs) => {
            for (label, path) in &outputs {
                println!("{}\t{}", label, path.display());
            }
        }
        Err(err) => {
            PipelineFailed { error: &err }.log();
            let code = match &err {
                PipelineError::Execution(ExecutionError::Cancelled) => 130,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}
