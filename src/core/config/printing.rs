use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset)"),
        }
        match self.window_size {
            Some(size) => println!("  window-size: {size}"),
            None => println!("  window-size: {} (default)", self.window_size()),
        }
        println!("  credential-store: {}", self.credential_store());
        match self.resolved_data_dir() {
            Ok(dir) => println!("  data-dir: {}", path_display(dir)),
            Err(err) => println!("  data-dir: ({err})"),
        }
        match self.request_timeout_secs {
            Some(secs) => println!("  request-timeout: {secs}s"),
            None => println!("  request-timeout: (none)"),
        }
        if self.base_urls.is_empty() {
            println!("  base-urls: (provider defaults)");
        } else {
            println!("  base-urls:");
            for (provider, url) in &self.base_urls {
                println!("    {provider}: {url}");
            }
        }
    }
}
