use crate::{context::Context, process, Result};

/// Returns the name of the kubeconfig context kubectl currently points at.
pub fn current_context(ctx: &Context) -> Result<String> {
    let output = process::command!("kubectl", "config", "current-context").output(ctx)?;
    let context = output.stdout_str()?.trim();
    if context.is_empty() {
        return Err("kubectl does not have a current context".into());
    }
    Ok(context.to_owned())
}

/// Whether `context` names a cluster that runs on this machine and therefore shares its docker
/// daemon.
pub fn is_local_cluster(context: &str) -> bool {
    matches!(context, "minikube" | "docker-desktop" | "docker-for-desktop")
        || context.starts_with("kind-")
        || context.starts_with("k3d-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_clusters() {
        for context in [
            "minikube",
            "docker-desktop",
            "docker-for-desktop",
            "kind-dev",
            "k3d-local",
        ] {
            assert!(is_local_cluster(context), "{context}");
        }
        for context in ["gke_project_zone_cluster", "minikube-remote", "kind", ""] {
            assert!(!is_local_cluster(context), "{context}");
        }
    }
}
