use super::*;

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let prefix = match cli.prefix {
        Some(prefix) => prefix,
        None => default_user_prefix()?,
    };
    let layout = PrefixLayout::new(prefix);
    let config = load_config(cli.config.as_deref(), &layout)?;
    let renderer = TerminalRenderer::from_style(current_output_style(cli.plain));
    let style = renderer.style();

    match cli.command {
        Commands::Register {
            name,
            version,
            dependencies,
            files,
        } => {
            let package = run_register_command(&layout, &name, &version, &dependencies, &files)?;
            println!(
                "{}",
                render_status_line(
                    style,
                    "ok",
                    &format!("registered {} {}", package.name, package.version)
                )
            );
        }
        Commands::List => {
            let state = load_state(&layout)?;
            renderer.print_lines(&format_list_lines(&state.registry));
        }
        Commands::Show { name } => {
            let state = load_state(&layout)?;
            renderer.print_lines(&format_show_lines(&layout, &state.registry, &name)?);
        }
        Commands::SoftUninstall { names } => {
            let results = run_soft_uninstall_command(&layout, &names)?;
            renderer.print_lines(&format_soft_uninstall_lines(&results, style));
        }
        Commands::Invalidate {
            root,
            excluded,
            touch,
        } => {
            let root = config.root_or_default(root);
            let recorded = run_invalidate_command(&layout, &config, &root, &excluded, &touch)?;
            renderer.print_lines(&format_invalidate_lines(&root, &recorded, style));
        }
        Commands::Plan { root, json } => {
            let root = config.root_or_default(root);
            let plan = run_plan_command(&layout, &root)?;
            let was_dirty = load_state(&layout)?.invalidation.is_dirty(&root);
            if json {
                println!("{}", serde_json::to_string_pretty(&plan_json(&plan, was_dirty))?);
            } else {
                renderer.print_lines(&format_plan_lines(&plan, was_dirty));
            }
        }
        Commands::Rebuild { root, command } => {
            let root = config.root_or_default(root);
            let template = command
                .or_else(|| config.rebuild.command.clone())
                .ok_or_else(|| {
                    anyhow!("no rebuild command configured; pass --command or set [rebuild].command")
                })?;

            renderer.print_section(&format!("Rebuilding {root}"));
            let total = planned_package_count(&layout, &root)?;
            let mut progress = renderer.start_progress("rebuild", total as u64);
            let report = run_rebuild_command(&layout, &root, &template, |package| {
                progress.set_message(&package.name);
                progress.advance();
            });
            progress.finish();

            let report = report?;
            renderer.print_lines(&format_rebuild_report_lines(&report, style));
            let failed = report.failed();
            if !failed.is_empty() {
                return Err(anyhow!("rebuild failed for: {}", failed.join(", ")));
            }
        }
        Commands::Doctor => {
            let state = load_state(&layout)?;
            renderer.print_lines(&format_doctor_lines(&layout, &state)?);
        }
        Commands::Repair => {
            let repair = run_repair_command(&layout)?;
            renderer.print_lines(&format_repair_lines(&repair, style));
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            write_completions_script(shell, &mut stdout)?;
        }
    }

    Ok(())
}
