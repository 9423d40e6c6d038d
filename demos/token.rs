use ecotwin::EcoTwinApi;

fn main() {
    let api = EcoTwinApi::from_env_values();

    let token = api.access_token().expect("Failed to authenticate");
    println!("token: {:?}", token.secret());
}
