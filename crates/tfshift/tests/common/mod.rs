use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tfshift_exec::{
    CancelToken, ExecError, MvOutcome, Plan, PlanOptions, PlanOutcome, State, StateRef,
    TerraformCli,
};

type Resources = BTreeMap<String, String>;

pub const OVERRIDE_ERROR: &str = "Error: Failed to create workspace: permission denied";

pub const BUCKET_ERROR: &str = "Error: \"bucket\": required field is not set";

/// In-memory terraform for one directory
///
/// State documents are JSON `{"resources": {address: id}}`. The
/// configuration is a set of desired addresses: a plan reports changes
/// when the addresses tracked by a state differ from it.
#[derive(Clone)]
pub struct FakeTerraform {
    dir: PathBuf,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    remote: Resources,
    local: Option<Resources>,
    local_pushes: usize,
    desired: BTreeSet<String>,
    importable: BTreeSet<String>,
    workspace: String,
    overridden: bool,
    calls: Vec<String>,
    plan_args: Vec<Vec<String>>,
    fail_push: bool,
    fail_restore: bool,
    fail_override: bool,
    cancel_on: Option<(String, CancelToken)>,
}

impl FakeTerraform {
    /// A directory whose configuration matches its remote state
    pub fn new(dir: &str, resources: &[(&str, &str)]) -> Self {
        let remote: Resources = resources
            .iter()
            .map(|(addr, id)| (addr.to_string(), id.to_string()))
            .collect();
        let desired = remote.keys().cloned().collect();

        Self {
            dir: PathBuf::from(dir),
            inner: Arc::new(Mutex::new(Inner {
                remote,
                local: None,
                local_pushes: 0,
                desired,
                importable: BTreeSet::new(),
                workspace: "default".to_string(),
                overridden: false,
                calls: Vec::new(),
                plan_args: Vec::new(),
                fail_push: false,
                fail_restore: false,
                fail_override: false,
                cancel_on: None,
            })),
        }
    }

    /// Replace the configuration's addresses
    pub fn with_desired(self, addresses: &[&str]) -> Self {
        self.lock().desired = addresses.iter().map(|a| a.to_string()).collect();
        self
    }

    #[allow(dead_code)]
    pub fn with_importable(self, ids: &[&str]) -> Self {
        self.lock().importable = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    #[allow(dead_code)]
    pub fn with_workspace(self, workspace: &str) -> Self {
        self.lock().workspace = workspace.to_string();
        self
    }

    pub fn failing_push(self) -> Self {
        self.lock().fail_push = true;
        self
    }

    pub fn failing_restore(self) -> Self {
        self.lock().fail_restore = true;
        self
    }

    /// The override gets as far as the local backend, then `workspace new`
    /// fails
    pub fn failing_override(self) -> Self {
        self.lock().fail_override = true;
        self
    }

    /// Cancel `token` when `command` is issued
    #[allow(dead_code)]
    pub fn cancel_on(self, command: &str, token: &CancelToken) -> Self {
        self.lock().cancel_on = Some((command.to_string(), token.clone()));
        self
    }

    pub fn remote_addresses(&self) -> Vec<String> {
        self.lock().remote.keys().cloned().collect()
    }

    #[allow(dead_code)]
    pub fn remote_id(&self, address: &str) -> Option<String> {
        self.lock().remote.get(address).cloned()
    }

    #[allow(dead_code)]
    pub fn current_workspace(&self) -> String {
        self.lock().workspace.clone()
    }

    pub fn is_overridden(&self) -> bool {
        self.lock().overridden
    }

    /// Whether a push ever landed on the local override
    #[allow(dead_code)]
    pub fn pushed_to_local(&self) -> bool {
        self.lock().local_pushes > 0
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == command).count()
    }

    #[allow(dead_code)]
    pub fn plan_args(&self) -> Vec<Vec<String>> {
        self.lock().plan_args.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Log `command` and honour cancellation
    fn begin(&self, command: &str, cancel: &CancelToken) -> Result<(), ExecError> {
        let mut inner = self.lock();
        if let Some((trigger, token)) = &inner.cancel_on {
            if trigger == command {
                token.cancel();
            }
        }
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled(format!("terraform {}", command)));
        }
        inner.calls.push(command.to_string());
        Ok(())
    }
}

fn failed(command: &str, stderr: &str) -> ExecError {
    ExecError::CommandFailed {
        command: format!("terraform {}", command),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

pub fn encode(resources: &Resources) -> State {
    let doc = serde_json::json!({ "resources": resources });
    State::new(serde_json::to_vec(&doc).unwrap())
}

pub fn decode(state: &State) -> Resources {
    decode_bytes(state.bytes())
}

fn decode_bytes(bytes: &[u8]) -> Resources {
    if bytes.is_empty() {
        return Resources::new();
    }
    let doc: serde_json::Value = serde_json::from_slice(bytes).unwrap();
    serde_json::from_value(doc["resources"].clone()).unwrap()
}

/// Addresses of a state document, sorted
pub fn addresses(state: &State) -> Vec<String> {
    decode(state).into_keys().collect()
}

fn load(doc: StateRef<'_>) -> Resources {
    match doc {
        StateRef::Memory(state) => decode(state),
        StateRef::File(path) => decode_bytes(&std::fs::read(path).unwrap()),
    }
}

/// Write a document back: memory documents are returned, files rewritten
fn store(doc: StateRef<'_>, resources: &Resources) -> Option<State> {
    let state = encode(resources);
    match doc {
        StateRef::Memory(_) => Some(state),
        StateRef::File(path) => {
            std::fs::write(path, state.bytes()).unwrap();
            None
        }
    }
}

/// Entries under `source`, either the address itself or a module prefix
fn matching(resources: &Resources, source: &str) -> Vec<String> {
    resources
        .keys()
        .filter(|addr| matches_address(addr, source))
        .cloned()
        .collect()
}

fn matches_address(addr: &str, filter: &str) -> bool {
    addr == filter || addr.starts_with(&format!("{}.", filter))
}

fn move_entries(
    from: &mut Resources,
    to: &mut Resources,
    source: &str,
    destination: &str,
) -> Result<(), ExecError> {
    let moved = matching(from, source);
    if moved.is_empty() {
        return Err(failed(
            "state mv",
            &format!("Error: Invalid source address\n\nCannot move {}: does not match anything in the current state.", source),
        ));
    }

    let renamed: Vec<(String, String)> = moved
        .into_iter()
        .map(|addr| {
            let new_addr = format!("{}{}", destination, &addr[source.len()..]);
            (addr, new_addr)
        })
        .collect();
    if renamed.iter().any(|(_, new_addr)| to.contains_key(new_addr)) {
        return Err(failed(
            "state mv",
            &format!("Error: Invalid target address\n\nCannot move to {}: there is already a resource instance at that address.", destination),
        ));
    }

    for (addr, new_addr) in renamed {
        if let Some(id) = from.remove(&addr) {
            to.insert(new_addr, id);
        }
    }
    Ok(())
}

#[async_trait]
impl TerraformCli for FakeTerraform {
    fn dir(&self) -> &Path {
        &self.dir
    }

    async fn init(&self, _args: &[String], cancel: &CancelToken) -> Result<(), ExecError> {
        self.begin("init", cancel)?;
        Ok(())
    }

    async fn workspace_show(&self, cancel: &CancelToken) -> Result<String, ExecError> {
        self.begin("workspace show", cancel)?;
        let inner = self.lock();
        Ok(inner.workspace.clone())
    }

    async fn workspace_select(&self, workspace: &str, cancel: &CancelToken) -> Result<(), ExecError> {
        self.begin("workspace select", cancel)?;
        let mut inner = self.lock();
        inner.workspace = workspace.to_string();
        Ok(())
    }

    async fn workspace_new(&self, _workspace: &str, cancel: &CancelToken) -> Result<(), ExecError> {
        self.begin("workspace new", cancel)?;
        Ok(())
    }

    async fn state_pull(&self, cancel: &CancelToken) -> Result<State, ExecError> {
        self.begin("state pull", cancel)?;
        let inner = self.lock();
        let current = match (&inner.local, inner.overridden) {
            (Some(local), true) => local.clone(),
            (None, true) => Resources::new(),
            (_, false) => inner.remote.clone(),
        };
        Ok(encode(&current))
    }

    async fn state_push(&self, state: &State, force: bool, cancel: &CancelToken) -> Result<(), ExecError> {
        self.begin("state push", cancel)?;
        let mut inner = self.lock();
        if !force {
            return Err(failed("state push", "Error: cannot overwrite existing state with serial 1 with a different state that has the same serial"));
        }
        if inner.fail_push {
            return Err(failed("state push", "Error: Failed to write state: AccessDenied"));
        }
        if inner.overridden {
            inner.local = Some(decode(state));
            inner.local_pushes += 1;
        } else {
            inner.remote = decode(state);
        }
        Ok(())
    }

    async fn state_mv(
        &self,
        from: StateRef<'_>,
        to: Option<StateRef<'_>>,
        source: &str,
        destination: &str,
        cancel: &CancelToken,
    ) -> Result<MvOutcome, ExecError> {
        self.begin("state mv", cancel)?;

        let mut from_resources = load(from);
        match to {
            None => {
                let mut renamed = from_resources.clone();
                let mut scratch = Resources::new();
                move_entries(&mut renamed, &mut scratch, source, destination)?;
                if scratch.keys().any(|addr| renamed.contains_key(addr)) {
                    return Err(failed(
                        "state mv",
                        &format!("Error: Invalid target address\n\nCannot move to {}: there is already a resource instance at that address.", destination),
                    ));
                }
                renamed.extend(scratch);
                Ok(MvOutcome {
                    from: store(from, &renamed),
                    to: None,
                })
            }
            Some(to) => {
                let mut to_resources = load(to);
                move_entries(&mut from_resources, &mut to_resources, source, destination)?;
                Ok(MvOutcome {
                    from: store(from, &from_resources),
                    to: store(to, &to_resources),
                })
            }
        }
    }

    async fn state_rm(
        &self,
        state: &State,
        addresses: &[String],
        cancel: &CancelToken,
    ) -> Result<State, ExecError> {
        self.begin("state rm", cancel)?;

        // like terraform: whatever matches is removed, and the command only
        // fails when no address matches at all
        let mut resources = decode(state);
        let removed: Vec<String> = addresses
            .iter()
            .flat_map(|address| matching(&resources, address))
            .collect();
        if removed.is_empty() {
            return Err(failed(
                "state rm",
                "Error: Invalid target address\n\nNo matching objects found.",
            ));
        }
        for addr in removed {
            resources.remove(&addr);
        }
        Ok(encode(&resources))
    }

    async fn import(
        &self,
        state: &State,
        address: &str,
        id: &str,
        cancel: &CancelToken,
    ) -> Result<State, ExecError> {
        self.begin("import", cancel)?;
        let inner = self.lock();

        let mut resources = decode(state);
        if resources.contains_key(address) {
            return Err(failed(
                "import",
                &format!("Error: Resource already managed by Terraform\n\nTerraform is already managing a remote object for {}.", address),
            ));
        }
        if !inner.importable.contains(id) {
            return Err(failed(
                "import",
                &format!("Error: Cannot import non-existent remote object\n\nWhile attempting to import an existing object to \"{}\", the provider detected that no object exists with the given id.", address),
            ));
        }
        resources.insert(address.to_string(), id.to_string());
        Ok(encode(&resources))
    }

    async fn state_list(
        &self,
        state: Option<&State>,
        addresses: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<String>, ExecError> {
        self.begin("state list", cancel)?;
        let inner = self.lock();
        let resources = match state {
            Some(state) => decode(state),
            None => inner.remote.clone(),
        };
        Ok(resources
            .into_keys()
            .filter(|addr| addresses.is_empty() || addresses.iter().any(|a| matches_address(addr, a)))
            .collect())
    }

    async fn plan(
        &self,
        state: Option<&State>,
        options: &PlanOptions,
        cancel: &CancelToken,
    ) -> Result<PlanOutcome, ExecError> {
        self.begin("plan", cancel)?;
        let mut inner = self.lock();
        inner.plan_args.push(options.args.clone());

        let resources = match state {
            Some(state) => decode(state),
            None => inner.remote.clone(),
        };
        let tracked: BTreeSet<String> = resources.into_keys().collect();
        let has_change = match &options.target {
            Some(target) => tracked.contains(target) != inner.desired.contains(target),
            None => tracked != inner.desired,
        };

        let plan = options.save.then(|| {
            let changes: Vec<String> = tracked.symmetric_difference(&inner.desired).cloned().collect();
            Plan::new(format!("changes: {}", changes.join(",")).into_bytes())
        });
        Ok(PlanOutcome { has_change, plan })
    }

    async fn apply(&self, _plan: &Plan, cancel: &CancelToken) -> Result<(), ExecError> {
        self.begin("apply", cancel)?;
        Ok(())
    }

    async fn override_backend_to_local(
        &self,
        _workspace: &str,
        cancel: &CancelToken,
    ) -> Result<(), ExecError> {
        self.begin("override", cancel)?;
        let mut inner = self.lock();
        inner.overridden = true;
        if inner.fail_override {
            return Err(failed("workspace new", OVERRIDE_ERROR));
        }
        Ok(())
    }

    async fn switch_back_to_remote(&self, _workspace: &str, cancel: &CancelToken) -> Result<(), ExecError> {
        self.begin("restore", cancel)?;
        let mut inner = self.lock();
        if inner.fail_restore {
            return Err(failed("init -reconfigure", BUCKET_ERROR));
        }
        inner.overridden = false;
        inner.local = None;
        Ok(())
    }
}
