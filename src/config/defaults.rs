//! Built-in multi-architecture policy.
//!
//! Three targets, run in this order: Dockerfiles under `build/` get a
//! `--platform` option on every `FROM`, values files under
//! `deployments/aws/` get a node selector and a toleration for the
//! multi-arch node pool, and workflow pipelines under `.github/workflows/`
//! get `build_arch: amd64,arm64` in their `with:` block.

use crate::config::loader::{load_from_str, ConfigError};
use crate::config::schema::MigratorConfig;

pub const DEFAULT_CONFIG: &str = r#"# arch-patcher default policy
#
# root = "."   # search root; --root and ARCH_PATCHER_ROOT take precedence

[[targets]]
name = "docker"
subpath = "build"

[targets.match]
names = ["Dockerfile"]
case_insensitive = true

[targets.patch]
mode = "line"

[[targets.patch.substitutions]]
id = "platform"
when = { prefix = "FROM" }
unless_contains = "--platform="
find = "FROM"
replace = "FROM --platform=${TARGETPLATFORM}"

[[targets]]
name = "values"
subpath = "deployments/aws"

[targets.match]
suffixes = ["values.yaml"]

[targets.patch]
mode = "structured"

[[targets.patch.fragments]]
id = "node-selector"
path = "nodeSelector"
value = """
dedicated-to: multi-arch
"""

[[targets.patch.fragments]]
id = "tolerations"
path = "tolerations"
value = """
- key: dedicated-to
  operator: Equal
  value: multi-arch
  effect: NoSchedule
"""

[[targets]]
name = "ci"
subpath = ".github/workflows"

[targets.match]
suffixes = ["pipeline.yml", "pipeline.yaml"]

[targets.patch]
mode = "line"

[[targets.patch.fragments]]
id = "build-arch"
marker = "build_arch: amd64,arm64"
anchor = { contains = "with:" }
lines = ["      build_arch: amd64,arm64"]

[targets.patch.fragments.fallback]
marker = { contains = "uses: InDriver/base-workflows/.github/workflows/go_pipeline.yaml@main" }
synthesize = ["    with:"]
"#;

pub fn default_config() -> Result<MigratorConfig, ConfigError> {
    load_from_str(DEFAULT_CONFIG)
}
