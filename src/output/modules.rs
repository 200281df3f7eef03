use crate::registry::ModuleRegistry;
use std::fmt::Write;

/// Formats every known module with its validity, plus modules that failed to load
pub fn format_module_list(registry: &ModuleRegistry) -> String {
    let stats = registry.statistics();
    let mut out = String::new();

    let _ = writeln!(out, "=== Modules ({}) ===\n", registry.root().display());

    for module in registry.list() {
        let marker = if stats.errors.contains_key(&module.name) {
            "invalid"
        } else {
            "ok"
        };
        let async_note = if module.capabilities.async_fetch {
            ", async"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  [{}] {} ({}{}) {}",
            marker, module.name, module.display_name, async_note, module.base_url
        );
        if let Some(errors) = stats.errors.get(&module.name) {
            for error in errors {
                let _ = writeln!(out, "        - {}", error);
            }
        }
    }

    if !stats.load_failures.is_empty() {
        let _ = writeln!(out, "\nFailed to load:");
        for failure in &stats.load_failures {
            let _ = writeln!(out, "  {}: {}", failure.name, failure.reason);
        }
    }

    let _ = writeln!(
        out,
        "\nTotal: {} modules, {} valid, {} invalid, {} failed to load",
        stats.total,
        stats.valid,
        stats.invalid,
        stats.load_failures.len()
    );

    out
}

/// Prints the module list to stdout
pub fn print_module_list(registry: &ModuleRegistry) {
    print!("{}", format_module_list(registry));
}
