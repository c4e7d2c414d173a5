use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interpret a deal query and print the search criteria as json
    Parse {
        /// Free-form query, e.g. "UK, ES, Facebook CPA"
        #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,

        /// Only use the pattern parser, never call the completion service
        #[clap(long, default_value = "false")]
        no_fallback: bool,
    },

    /// Print the loaded reference vocabulary
    Vocab {
        /// Look up the partner name for a partner id
        #[clap(long)]
        partner_id: Option<String>,
    },

    /// Start the http service.
    Serve {
        /// Address to listen on, overrides server.listen
        #[clap(short, long)]
        listen: Option<String>,
    },
}
