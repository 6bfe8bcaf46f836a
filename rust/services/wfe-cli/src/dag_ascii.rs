//! `--dag-ascii`: a minimal textual topological-layer listing of a
//! workflow's jobs. Not ASCII box-drawing — that's explicitly out of
//! scope — just enough to satisfy the flag's contract (emit the DAG, exit
//! 0) using `wfe-dag`'s generic algorithms.

use std::collections::HashMap;

use wfe_driver::WorkflowDoc;

pub fn render(doc: &WorkflowDoc) -> Result<String, String> {
    let ids: Vec<String> = doc.jobs.iter().map(|j| j.effective_id()).collect();
    let needs: HashMap<String, Vec<String>> = doc
        .jobs
        .iter()
        .map(|j| (j.effective_id(), j.needs.clone()))
        .collect();

    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for (id, deps) in &needs {
        for dep in deps {
            dependents.entry(dep.clone()).or_default().push(id.clone());
        }
    }

    let order = wfe_dag::topological_sort(&ids, |id| dependents.get(id).cloned().unwrap_or_default())
        .map_err(|e| e.to_string())?;

    let mut level: HashMap<&str, usize> = HashMap::new();
    for id in &order {
        let lvl = needs
            .get(id)
            .map(|deps| deps.iter().map(|d| level[d.as_str()] + 1).max().unwrap_or(0))
            .unwrap_or(0);
        level.insert(id, lvl);
    }

    let max_level = level.values().copied().max().unwrap_or(0);
    let mut layers: Vec<Vec<&str>> = vec![Vec::new(); max_level + 1];
    for id in &order {
        layers[level[id.as_str()]].push(id);
    }

    let mut out = String::new();
    for (i, layer) in layers.iter().enumerate() {
        out.push_str(&format!("layer {i}: {}\n", layer.join(", ")));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfe_driver::load_workflow;
    use std::io::Write;

    fn workflow_from(yaml: &str) -> WorkflowDoc {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        load_workflow(&[f.path()]).unwrap()
    }

    #[test]
    fn linear_chain_has_three_layers() {
        let doc = workflow_from(
            r#"
name: demo
jobs:
  - name: a
    steps: []
  - name: b
    needs: [a]
    steps: []
  - name: c
    needs: [b]
    steps: []
"#,
        );
        let text = render(&doc).unwrap();
        assert!(text.contains("layer 0: a"));
        assert!(text.contains("layer 1: b"));
        assert!(text.contains("layer 2: c"));
    }

    #[test]
    fn cycle_is_reported_as_an_error() {
        let doc = workflow_from(
            r#"
name: demo
jobs:
  - name: a
    needs: [b]
    steps: []
  - name: b
    needs: [a]
    steps: []
"#,
        );
        assert!(render(&doc).is_err());
    }
}
