//! Demo: Show inferred native types for a small Python module
//!
//! Run with `RUST_LOG=zyth_core=debug` to see the pipeline stages.

use tracing_subscriber::EnvFilter;
use zyth_core::InferencePipeline;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let python_code = r#"
class Point:
    def __init__(self, x, y):
        self.x = x
        self.y = y

    def norm(self):
        return (self.x * self.x + self.y * self.y) ** 0.5

def calculate_stats(numbers: list[int]) -> dict[str, float]:
    total = 0
    count = 0
    for num in numbers:
        total = total + num
        count = count + 1
    average = total / count if count > 0 else 0.0
    return {"sum": total, "count": count, "average": average}

def make_adder(n):
    def add(x):
        return x + n
    return add

names = ["ada", "grace"]
names.append("barbara")
p = Point(3, 4)
length = p.norm()
"#;

    let env = InferencePipeline::new().analyze(python_code)?;

    println!("=== Module ===");
    for (name, ty) in env.module_vars() {
        println!("  {}: {}", name, ty.zig_type_name());
    }
    println!();

    for scope in env.scope_names() {
        println!("Scope: {}", scope);
        println!("{}", "-".repeat(40));
        if let Some(vars) = env.scope_vars(scope) {
            for (name, ty) in vars {
                println!("    {}: {}", name, ty.zig_type_name());
            }
        }
        if let Some(ret) = env.function_return(scope) {
            println!("  Return type: {}", ret.zig_type_name());
        }
        if let Some(captures) = env.captures(scope).filter(|c| !c.is_empty()) {
            let names: Vec<_> = captures.iter().map(String::as_str).collect();
            println!("  Captures: {}", names.join(", "));
        }
        println!();
    }

    for class in env.classes() {
        println!("Class: {}", class.name);
        for (field, ty) in &class.fields {
            println!("    self.{}: {}", field, ty.zig_type_name());
        }
    }

    Ok(())
}
