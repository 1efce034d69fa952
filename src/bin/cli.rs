use blink_motors::models::LoginResponse;
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::fs;

const TOKEN_FILE: &str = ".blink_token";

#[derive(Parser)]
#[command(name = "blink-cli")]
#[command(about = "CLI for the Blink Motors API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a user and store the issued token
    Login {
        #[arg(short, long)]
        email: String,
        /// Extra profile fields as a JSON object
        #[arg(short, long, default_value = "{}")]
        profile: String,
    },
    Profile {
        #[arg(short, long)]
        email: String,
    },
    Users,
    IsAdmin {
        #[arg(short, long)]
        email: String,
    },
    MakeAdmin {
        #[arg(short, long)]
        email: String,
    },
    Products,
    Product {
        #[arg(short, long)]
        id: String,
    },
    AddProduct {
        /// Product document as a JSON object
        #[arg(short, long)]
        doc: String,
    },
    Orders {
        /// Only orders placed with this email
        #[arg(short, long)]
        email: Option<String>,
    },
    PlaceOrder {
        #[arg(short, long)]
        doc: String,
    },
    ConfirmOrder {
        #[arg(short, long)]
        id: String,
    },
    DeleteOrder {
        #[arg(short, long)]
        id: String,
    },
    Reviews,
    AddReview {
        #[arg(short, long)]
        doc: String,
    },
    Blogs,
    AddBlog {
        #[arg(short, long)]
        doc: String,
    },
    Logout,
}

fn authed(builder: RequestBuilder) -> RequestBuilder {
    let token = fs::read_to_string(TOKEN_FILE).unwrap_or_default();
    builder.bearer_auth(token.trim())
}

async fn print_response(builder: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let res = builder.send().await?;
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => println!("{status}\n{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{status}\n{text}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Login { email, profile } => {
            let profile: Value = serde_json::from_str(&profile)?;
            let res = client.put(format!("{url}/user/{email}")).json(&profile).send().await?;
            if res.status().is_success() {
                let body: LoginResponse = res.json().await?;
                fs::write(TOKEN_FILE, &body.token)?;
                println!("Logged in as {email}. Token saved to {TOKEN_FILE}");
            } else {
                println!("Login failed: {}", res.text().await?);
            }
        }
        Commands::Profile { email } => {
            print_response(authed(client.get(format!("{url}/user/profile/{email}")))).await?
        }
        Commands::Users => print_response(authed(client.get(format!("{url}/user")))).await?,
        Commands::IsAdmin { email } => {
            print_response(client.get(format!("{url}/admin/{email}"))).await?
        }
        Commands::MakeAdmin { email } => {
            print_response(authed(client.put(format!("{url}/user/admin/{email}")))).await?
        }
        Commands::Products => print_response(client.get(format!("{url}/product"))).await?,
        Commands::Product { id } => {
            print_response(authed(client.get(format!("{url}/product/{id}")))).await?
        }
        Commands::AddProduct { doc } => {
            let doc: Value = serde_json::from_str(&doc)?;
            print_response(authed(client.post(format!("{url}/product")).json(&doc))).await?
        }
        Commands::Orders { email } => {
            let path = match email {
                Some(email) => format!("{url}/order/{email}"),
                None => format!("{url}/order"),
            };
            print_response(authed(client.get(path))).await?
        }
        Commands::PlaceOrder { doc } => {
            let doc: Value = serde_json::from_str(&doc)?;
            print_response(authed(client.post(format!("{url}/order")).json(&doc))).await?
        }
        Commands::ConfirmOrder { id } => {
            print_response(authed(client.put(format!("{url}/order/admin/{id}")))).await?
        }
        Commands::DeleteOrder { id } => {
            print_response(authed(client.delete(format!("{url}/order/{id}")))).await?
        }
        Commands::Reviews => print_response(client.get(format!("{url}/user/review"))).await?,
        Commands::AddReview { doc } => {
            let doc: Value = serde_json::from_str(&doc)?;
            print_response(authed(client.post(format!("{url}/user/review")).json(&doc))).await?
        }
        Commands::Blogs => print_response(client.get(format!("{url}/user/blog"))).await?,
        Commands::AddBlog { doc } => {
            let doc: Value = serde_json::from_str(&doc)?;
            print_response(authed(client.post(format!("{url}/admin/blog")).json(&doc))).await?
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out (token removed).");
        }
    }

    Ok(())
}
