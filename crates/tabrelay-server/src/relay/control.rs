//! In-page control-mode re-initialization.
//!
//! The relay does not know how the page implements control mode. It only
//! asks a [`ControlScriptProvider`] for a snippet that applies a
//! configuration, and submits that snippet like any other `execute`.

use tabrelay_core::ControlConfiguration;

/// Builds the JavaScript that applies a control configuration in the page.
#[cfg_attr(test, mockall::automock)]
pub trait ControlScriptProvider: Send + Sync {
    /// Snippet that re-initializes control mode with `config`.
    fn reinit_script(&self, config: &ControlConfiguration) -> String;
}

/// Calls `window.__tabrelayControl.reinit(config)` when the page exposes
/// it, otherwise dispatches a `tabrelay:reinit-control` DOM event.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultControlScript;

impl ControlScriptProvider for DefaultControlScript {
    fn reinit_script(&self, config: &ControlConfiguration) -> String {
        let config_json = config.clone().into_value().to_string();
        format!(
            r"(() => {{
  const config = {config_json};
  const control = window.__tabrelayControl;
  if (control && typeof control.reinit === 'function') {{
    control.reinit(config);
  }} else {{
    window.dispatchEvent(new CustomEvent('tabrelay:reinit-control', {{ detail: config }}));
  }}
  return {{ reinitialized: true, keys: Object.keys(config).length }};
}})()"
        )
    }
}
